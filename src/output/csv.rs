use super::cell_text;
use crate::sql::Results;

pub struct CsvFormatter;

impl CsvFormatter {
    pub fn format(results: &Results, no_headers: bool) -> String {
        let mut lines = Vec::new();

        if !no_headers {
            lines.push(results.headers.join(","));
        }

        for row in &results.rows {
            let escaped: Vec<String> = row
                .columns
                .iter()
                .map(|value| {
                    let text = cell_text(value);
                    if text.contains(',') || text.contains('"') || text.contains('\n') {
                        format!("\"{}\"", text.replace('"', "\"\""))
                    } else {
                        text
                    }
                })
                .collect();
            lines.push(escaped.join(","));
        }

        lines.join("\n")
    }
}
