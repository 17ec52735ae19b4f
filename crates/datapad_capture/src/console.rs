//! Best-effort structured parsing of console text.
//!
//! The last resort of capture: when a cell produced neither explicit nor
//! implicit artifacts but did print something table-shaped, recover a table
//! from the text. Original whitespace is preserved up to this point, since
//! leading indentation is what distinguishes an aligned single-column block
//! from plain prose.

use datapad_core::{Table, Value};
use regex::Regex;

/// Try to parse console text into a table.
///
/// Multi-column: lines split on runs of 2+ spaces, first line is the
/// header, every following line must have the same field count.
/// Single-column: every line holds one field and every line is indented
/// (aligned output); the first line is the header.
pub fn parse_console_table(text: &str) -> Option<Table> {
    let lines: Vec<&str> = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .collect();
    if lines.len() < 2 {
        return None;
    }

    let splitter = Regex::new(r" {2,}|\t+").expect("static regex");
    let fields: Vec<Vec<&str>> = lines
        .iter()
        .map(|line| {
            splitter
                .split(line.trim())
                .filter(|f| !f.is_empty())
                .collect()
        })
        .collect();

    let width = fields[0].len();

    if width >= 2 {
        if !fields.iter().all(|row| row.len() == width) {
            return None;
        }
        let columns = fields[0].iter().map(|f| f.to_string()).collect();
        let rows = fields[1..]
            .iter()
            .map(|row| row.iter().map(|cell| parse_cell(cell)).collect())
            .collect();
        return Some(Table::new(columns, rows));
    }

    // Single column: only credible when the block is indented output, not
    // flush-left prose.
    let all_single = fields.iter().all(|row| row.len() == 1);
    let all_indented = lines
        .iter()
        .all(|line| line.starts_with(' ') || line.starts_with('\t'));
    if all_single && all_indented {
        let columns = vec![fields[0][0].to_string()];
        let rows = fields[1..]
            .iter()
            .map(|row| vec![parse_cell(row[0])])
            .collect();
        return Some(Table::new(columns, rows));
    }

    None
}

fn parse_cell(cell: &str) -> Value {
    if cell == "null" {
        return Value::Null;
    }
    if let Ok(n) = cell.parse::<i64>() {
        return Value::Int(n);
    }
    if let Ok(f) = cell.parse::<f64>() {
        return Value::Float(f);
    }
    Value::Str(cell.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multi_column_with_header() {
        let text = "region  revenue\nnorth  120\nsouth  95\n";
        let t = parse_console_table(text).unwrap();
        assert_eq!(t.columns, vec!["region", "revenue"]);
        assert_eq!(t.row_count(), 2);
        assert_eq!(t.rows[0][1], Value::Int(120));
        assert_eq!(t.rows[1][0], Value::Str("south".to_string()));
    }

    #[test]
    fn test_indented_single_column() {
        let text = "  value\n  10\n  20\n  30\n";
        let t = parse_console_table(text).unwrap();
        assert_eq!(t.columns, vec!["value"]);
        assert_eq!(t.row_count(), 3);
    }

    #[test]
    fn test_flush_left_prose_is_not_a_table() {
        let text = "loading\ndone\nbye\n";
        assert!(parse_console_table(text).is_none());
    }

    #[test]
    fn test_ragged_rows_are_rejected() {
        let text = "a  b\n1  2\n3\n";
        assert!(parse_console_table(text).is_none());
    }

    #[test]
    fn test_null_and_float_cells() {
        let text = "ts  score\nnull  1.5\n2024  2.0\n";
        let t = parse_console_table(text).unwrap();
        assert_eq!(t.rows[0][0], Value::Null);
        assert_eq!(t.rows[0][1], Value::Float(1.5));
        assert_eq!(t.rows[1][0], Value::Int(2024));
    }

    #[test]
    fn test_too_short_input() {
        assert!(parse_console_table("just one line\n").is_none());
        assert!(parse_console_table("").is_none());
    }
}
