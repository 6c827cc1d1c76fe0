use serde_json::Value;

use crate::sql::Results;

pub struct JsonFormatter;

impl JsonFormatter {
    pub fn format(results: &Results) -> String {
        let rows: Vec<Value> = results
            .rows
            .iter()
            .map(|row| {
                let obj: serde_json::Map<String, Value> = results
                    .headers
                    .iter()
                    .cloned()
                    .zip(row.columns.iter().cloned())
                    .collect();
                Value::Object(obj)
            })
            .collect();

        serde_json::to_string_pretty(&rows).unwrap_or_else(|_| "[]".to_string())
    }
}
