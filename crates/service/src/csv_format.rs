//! CSV and SQL renderings of the registry, and the permissive import parser.
//!
//! Import is positional: `serial, filename, timestamp, status`, any trailing
//! field may be missing. Fields may be double-quoted with `""` escapes.

use chrono::{DateTime, Utc};
use notescan_core::{
    canonicalize_serial, format_timestamp, parse_timestamp, RecordStatus, SerialRecord,
    CSV_HEADER, CSV_HEADER_TOKEN, CSV_IMPORT_SOURCE,
};
use notescan_storage::ImportRow;

/// Split one CSV line into fields, honoring double quotes.
///
/// A quote only opens a quoted section at the start of a field; elsewhere it
/// is kept literally.
pub fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            },
            '"' if field.trim().is_empty() => {
                field.clear();
                in_quotes = true;
            },
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}

/// Split CSV text into records, each paired with the line it starts on.
///
/// A line break inside a quoted field stays part of its record, so exported
/// filenames with embedded newlines survive a round trip. Quote rules match
/// [`split_csv_line`]. A trailing `\r` is dropped from each record.
pub fn split_csv_records(text: &str) -> Vec<(usize, &str)> {
    let mut records = Vec::new();
    let mut start = 0;
    let mut line = 1;
    let mut record_line = 1;
    let mut in_quotes = false;
    let mut field_start = true;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek().map(|&(_, next)| next) == Some('"') {
                    chars.next();
                } else {
                    in_quotes = false;
                }
            },
            '"' if field_start => {
                in_quotes = true;
                field_start = false;
            },
            '\n' => {
                line += 1;
                if !in_quotes {
                    records.push((record_line, text[start..idx].trim_end_matches('\r')));
                    start = idx + 1;
                    record_line = line;
                    field_start = true;
                }
            },
            ',' if !in_quotes => field_start = true,
            c if c.is_whitespace() => {},
            _ => {
                if !in_quotes {
                    field_start = false;
                }
            },
        }
    }
    if start < text.len() {
        records.push((record_line, text[start..].trim_end_matches('\r')));
    }
    records
}

/// Quote a field when it holds a comma, quote or line break.
pub fn escape_csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_owned()
    }
}

pub fn render_csv(records: &[SerialRecord]) -> String {
    let mut out = String::with_capacity(records.len().saturating_add(1).saturating_mul(64));
    out.push_str(CSV_HEADER);
    out.push('\n');
    for record in records {
        out.push_str(&escape_csv_field(&record.serial_number));
        out.push(',');
        out.push_str(&escape_csv_field(record.source_filename.as_deref().unwrap_or("")));
        out.push(',');
        out.push_str(&format_timestamp(&record.extracted_at));
        out.push(',');
        out.push_str(record.status.as_str());
        out.push('\n');
    }
    out
}

fn sql_literal(value: Option<&str>) -> String {
    value.map_or_else(|| "NULL".to_owned(), |v| format!("'{}'", v.replace('\'', "''")))
}

/// Portable dump: a schema statement plus one INSERT per record.
pub fn render_sql(records: &[SerialRecord], generated_at: DateTime<Utc>) -> String {
    let mut out = format!(
        "-- notescan serial registry export\n-- generated {}, {} records\n\nBEGIN;\n\n\
         CREATE TABLE IF NOT EXISTS serials (\n    \
         serial_number TEXT NOT NULL UNIQUE,\n    \
         source_filename TEXT,\n    \
         extracted_at TEXT NOT NULL,\n    \
         status TEXT NOT NULL DEFAULT 'confirmed'\n);\n\n",
        format_timestamp(&generated_at),
        records.len()
    );
    for record in records {
        out.push_str(&format!(
            "INSERT INTO serials (serial_number, source_filename, extracted_at, status) VALUES ({}, {}, {}, {});\n",
            sql_literal(Some(&record.serial_number)),
            sql_literal(record.source_filename.as_deref()),
            sql_literal(Some(&format_timestamp(&record.extracted_at))),
            sql_literal(Some(record.status.as_str())),
        ));
    }
    out.push_str("\nCOMMIT;\n");
    out
}

/// Whether an import's first line is a header rather than data.
pub fn is_header_line(line: &str) -> bool {
    line.to_ascii_lowercase().contains(CSV_HEADER_TOKEN)
}

/// Outcome of parsing one data line.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
    Row { row: ImportRow, warning: Option<String> },
    Skipped(String),
}

/// Parse one import data line. `now` fills a missing or unreadable timestamp.
pub fn parse_import_line(line: &str, now: DateTime<Utc>) -> ParsedLine {
    let fields = if line.contains(',') { split_csv_line(line) } else { vec![line.to_owned()] };
    let field = |idx: usize| fields.get(idx).map(|f| f.trim()).filter(|f| !f.is_empty());

    let Some(serial_number) = field(0).and_then(canonicalize_serial) else {
        return ParsedLine::Skipped(format!("no serial number in {line:?}"));
    };

    let source_filename = field(1).unwrap_or(CSV_IMPORT_SOURCE).to_owned();

    let mut warning = None;
    let extracted_at = match field(2) {
        None => now,
        Some(raw) => parse_timestamp(raw).unwrap_or_else(|| {
            warning = Some(format!("{serial_number}: unreadable timestamp {raw:?}, using import time"));
            now
        }),
    };

    let status = match field(3) {
        None => RecordStatus::Imported,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::debug!(serial = %serial_number, status = raw, "unknown import status, using imported");
            RecordStatus::Imported
        }),
    };

    ParsedLine::Row {
        row: ImportRow { serial_number, source_filename: Some(source_filename), extracted_at, status },
        warning,
    }
}
