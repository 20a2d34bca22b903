use serde_json::Value;

use crate::db::Row;

pub const NO_DATA: &str = "No data";

pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Renders rows as a fixed-width ASCII table with a `=` header rule.
///
/// Columns follow the key order of the first row. Every row is expected to
/// carry the same keys; a missing key renders as an empty cell.
pub fn render_table(rows: &[Row]) -> String {
    let Some(first) = rows.first() else {
        return NO_DATA.to_string();
    };

    let headers: Vec<&str> = first.keys().map(String::as_str).collect();
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            headers
                .iter()
                .map(|h| row.get(*h).map(cell_text).unwrap_or_default())
                .collect()
        })
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(format_line(headers.iter().copied(), &widths));

    let mut rule = String::new();
    for width in &widths {
        rule.push('|');
        rule.push_str(&"=".repeat(width + 2));
    }
    rule.push('|');
    lines.push(rule);

    for row in &cells {
        lines.push(format_line(row.iter().map(String::as_str), &widths));
    }

    lines.join("\n")
}

fn format_line<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let mut line = String::new();
    for (cell, width) in cells.zip(widths) {
        let pad = width - cell.chars().count();
        line.push_str("| ");
        line.push_str(cell);
        line.push(' ');
        line.push_str(&" ".repeat(pad));
    }
    line.push('|');
    line
}
