use super::cell_text;
use crate::sql::Results;

pub struct TableFormatter;

impl TableFormatter {
    /// Header line, a dash underline sized to each header, then one line
    /// per row with cells serialized as JSON. Columns are padded to a
    /// shared width, tab-writer style.
    pub fn format(results: &Results, no_headers: bool) -> String {
        let mut lines: Vec<Vec<String>> = Vec::new();

        if !no_headers {
            lines.push(results.headers.clone());
            lines.push(
                results
                    .headers
                    .iter()
                    .map(|h| "-".repeat(h.chars().count()))
                    .collect(),
            );
        }

        for row in &results.rows {
            lines.push(row.columns.iter().map(cell_text).collect());
        }

        let columns = results.headers.len();
        let mut widths = vec![0usize; columns];
        for line in &lines {
            for (idx, cell) in line.iter().enumerate() {
                widths[idx] = widths[idx].max(cell.chars().count());
            }
        }

        lines
            .iter()
            .map(|line| {
                let mut out = String::new();
                for (idx, cell) in line.iter().enumerate() {
                    out.push_str(cell);
                    // pad every column but the last to its shared width
                    if idx + 1 < line.len() {
                        let pad = widths[idx].saturating_sub(cell.chars().count()) + 1;
                        out.extend(std::iter::repeat_n(' ', pad));
                    }
                }
                out
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
