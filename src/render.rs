//! Writes result sets as CSV or as a fixed-width ASCII table.
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
//! Fixed-width columns are as wide as their widest value, at most 50
//! characters; longer values are cut and end in `...`.

use crate::connection::ResultSet;
use crate::options::Format;
use csv::{QuoteStyle, WriterBuilder};
use std::io::{self, Write};

const MAX_COLUMN_WIDTH: usize = 50;

/// Writes `result` in `format`, showing at most `limit` rows.
///
/// Returns the number of rows written.
pub fn write_result(
    out: &mut dyn Write,
    result: &ResultSet,
    format: Format,
    limit: Option<usize>,
) -> io::Result<usize> {
    let shown = limit.map_or(result.rows.len(), |n| n.min(result.rows.len()));
    let rows = &result.rows[..shown];
    match format {
        Format::Csv => write_csv(out, &result.columns, rows)?,
        Format::Fixed => {
            let table = TableFormatter::new(&result.columns, rows);
            out.write_all(table.render().as_bytes())?;
        }
    }
    Ok(shown)
}

fn write_csv(out: &mut dyn Write, columns: &[String], rows: &[Vec<Option<String>>]) -> io::Result<()> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .flexible(true)
        .from_writer(out);
    writer.write_record(columns)?;
    for row in rows {
        writer.write_record(row.iter().map(|v| v.as_deref().unwrap_or("")))?;
    }
    writer.flush()
}

struct TableFormatter {
    headers: Vec<String>,
    widths: Vec<usize>,
    rows: Vec<Vec<String>>,
}

impl TableFormatter {
    fn new(headers: &[String], rows: &[Vec<Option<String>>]) -> Self {
        let mut widths: Vec<usize> = headers
            .iter()
            .map(|h| display_width(h).clamp(1, MAX_COLUMN_WIDTH))
            .collect();

        let rows: Vec<Vec<String>> = rows
            .iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .map(|(i, value)| {
                        let text = value.clone().unwrap_or_else(|| "NULL".to_string());
                        if let Some(width) = widths.get_mut(i) {
                            *width = (*width).max(display_width(&text)).min(MAX_COLUMN_WIDTH);
                        }
                        text
                    })
                    .collect()
            })
            .collect();

        Self {
            headers: headers.to_vec(),
            widths,
            rows,
        }
    }

    fn render(&self) -> String {
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

    fn write_row(&self, output: &mut String, cells: &[String]) {
        output.push('|');
        for (i, cell) in cells.iter().enumerate() {
            let width = self.widths.get(i).copied().unwrap_or(1);
            let text = truncate(cell, width);
            let pad = width.saturating_sub(display_width(&text));
            output.push(' ');
            output.push_str(&text);
            output.push_str(&" ".repeat(pad));
            output.push_str(" |");
        }
        output.push('\n');
    }
}

fn display_width(s: &str) -> usize {
    s.chars().count()
}

fn truncate(s: &str, width: usize) -> String {
    if display_width(s) <= width {
        s.to_string()
    } else if width <= 3 {
        s.chars().take(width).collect()
    } else {
        let mut cut: String = s.chars().take(width - 3).collect();
        cut.push_str("...");
        cut
    }
}
