mod csv;
mod json;
mod table;

pub use csv::CsvFormatter;
pub use json::JsonFormatter;
pub use table::TableFormatter;

use serde_json::Value;

use crate::cli::OutputFormat;
use crate::sql::Results;

pub fn render(results: &Results, format: &OutputFormat, no_headers: bool) -> String {
    match format {
        OutputFormat::Table => TableFormatter::format(results, no_headers),
        OutputFormat::Json => JsonFormatter::format(results),
        OutputFormat::Csv => CsvFormatter::format(results, no_headers),
    }
}

/// Serialize one result cell: strings quoted, numbers bare, objects and
/// arrays in compact JSON form.
pub(crate) fn cell_text(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}
