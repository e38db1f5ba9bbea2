//! ASCII Table Formatter
//!
//! Renders the result of `find` as a boxed table:
//!
//! ```text
//! +----+-------+
//! | id | name  |
//! +----+-------+
//! | 1  | Alice |
//! | 2  | NULL  |
//! +----+-------+
//! ```
//!
//! Column width is the widest of the header and the cells, capped at
//! [`MAX_COLUMN_WIDTH`] characters; longer values are cut and end in `...`.

use std::fmt::Write;

pub const MAX_COLUMN_WIDTH: usize = 50;

pub struct TableFormatter {
    headers: Vec<String>,
    widths: Vec<usize>,
    rows: Vec<Vec<String>>,
}

impl TableFormatter {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let mut widths: Vec<usize> = headers
            .iter()
            .map(|h| display_width(h).clamp(1, MAX_COLUMN_WIDTH))
            .collect();

        for row in &rows {
            for (i, value) in row.iter().enumerate() {
                if let Some(width) = widths.get_mut(i) {
                    *width = (*width).max(display_width(value)).min(MAX_COLUMN_WIDTH);
                }
            }
        }

        Self {
            headers,
            widths,
            rows,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Renders the table, one `\n`-terminated line per table line.
    pub fn render(&self) -> String {
        let mut output = String::new();

        self.write_separator(&mut output);
        self.write_row(&mut output, &self.headers);
        self.write_separator(&mut output);
        for row in &self.rows {
            self.write_row(&mut output, row);
        }
        self.write_separator(&mut output);

        output
    }

    fn write_separator(&self, output: &mut String) {
        output.push('+');
        for width in &self.widths {
            output.push_str(&"-".repeat(width + 2));
            output.push('+');
        }
        output.push('\n');
    }

    fn write_row(&self, output: &mut String, values: &[String]) {
        output.push('|');
        for (i, value) in values.iter().enumerate() {
            let width = self.widths.get(i).copied().unwrap_or(1);
            let _ = write!(output, " {:<width$} |", truncate(value, width), width = width);
        }
        output.push('\n');
    }
}

fn display_width(value: &str) -> usize {
    value.chars().count()
}

fn truncate(value: &str, width: usize) -> String {
    if display_width(value) <= width {
        return value.to_string();
    }
    if width <= 3 {
        return value.chars().take(width).collect();
    }
    let mut cut: String = value.chars().take(width - 3).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_render_table() {
        let table = TableFormatter::new(
            strings(&["id", "name"]),
            vec![strings(&["1", "Alice"]), strings(&["2", "NULL"])],
        );

        let expected = "\
+----+-------+
| id | name  |
+----+-------+
| 1  | Alice |
| 2  | NULL  |
+----+-------+
";
        assert_eq!(table.render(), expected);
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn test_render_empty_table() {
        let table = TableFormatter::new(strings(&["id"]), vec![]);
        assert_eq!(table.render(), "+----+\n| id |\n+----+\n+----+\n");
    }

    #[test]
    fn test_long_values_are_truncated() {
        let long = "x".repeat(80);
        let table = TableFormatter::new(strings(&["v"]), vec![vec![long]]);
        let rendered = table.render();

        let expected_cell = format!("| {}... |", "x".repeat(MAX_COLUMN_WIDTH - 3));
        assert!(rendered.contains(&expected_cell));
    }
}
