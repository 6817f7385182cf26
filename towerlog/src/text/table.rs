use std::collections::HashSet;

use chrono::{NaiveDate, NaiveDateTime};
use csv::{Position, StringRecord};
use tracing::warn;

use crate::error::{ErrorKind, LoadError, LoadResult};
use crate::load_error;
use crate::text::{TextDocument, find_param};
use crate::types::{Cell, ColumnKind, ColumnSchema, RecordBatch, TableRow};

/// Field delimiter of the measurement section.
pub const FIELD_DELIMITER: u8 = b'\t';
/// Prefix of the generated name of a column whose header field is empty.
pub const UNNAMED_COLUMN_PREFIX: &str = "Unnamed: ";

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Outcome of [`extract_table`].
#[derive(Debug)]
pub enum TableExtraction {
    /// A keyed table was found; it may still hold zero rows.
    Table(ExtractedTable),
    /// The start marker does not occur in the document.
    MarkerNotFound,
    /// The header row does not contain the key column.
    MissingKeyColumn,
}

/// A measurement table parsed from a document.
#[derive(Debug)]
pub struct ExtractedTable {
    /// 1-based line number of the header row.
    pub header_line: usize,
    pub batch: RecordBatch,
    /// Rows dropped because their key could not be used.
    pub rejected_rows: Vec<RejectedRow>,
}

/// A data row dropped during extraction.
#[derive(Debug)]
pub struct RejectedRow {
    pub line_number: usize,
    pub error: LoadError,
}

/// Parses the tab-delimited table whose header row is the first line containing `start_marker`.
///
/// Fields follow CSV quoting, so a quoted field may hold tabs or line breaks. The key column is
/// parsed as timestamps. A row with an empty, unparseable or repeated key is dropped and
/// reported in [`ExtractedTable::rejected_rows`]; the rest of the table is kept. Every other
/// column gets the narrowest kind that fits all of its non-empty values.
pub fn extract_table(doc: &TextDocument, start_marker: &str, key_column: &str) -> TableExtraction {
    let Some(found) = find_param(doc, start_marker) else {
        warn!(marker = start_marker, "data start marker not found");
        return TableExtraction::MarkerNotFound;
    };

    let header_line = found.line_number;
    let section = doc
        .lines_from(header_line)
        .map(|(_, line)| line)
        .collect::<Vec<_>>()
        .join("\n");

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(FIELD_DELIMITER)
        .has_headers(true)
        .flexible(true)
        .from_reader(section.as_bytes());

    let names = match reader.headers() {
        Ok(headers) => header_names(headers),
        Err(err) => {
            warn!(line = header_line, error = %err, "unreadable table header");
            return TableExtraction::MissingKeyColumn;
        }
    };
    let Some(key_index) = names.iter().position(|name| name == key_column) else {
        warn!(
            column = key_column,
            line = header_line,
            "key column missing from table header"
        );
        return TableExtraction::MissingKeyColumn;
    };

    let mut raw_rows: Vec<StringRecord> = Vec::new();
    let mut keys = Vec::new();
    let mut seen = HashSet::new();
    let mut rejected_rows = Vec::new();

    // Reader positions count lines from the header, which is line 1.
    let doc_line = |position: &Position| header_line + position.line() as usize - 1;

    for result in reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(err) => {
                let line_number = err.position().map_or(header_line, doc_line);
                let error = load_error!(ErrorKind::InvalidData, "Unreadable table row", source: err);
                warn!(line = line_number, error = %error, "dropping table row");
                rejected_rows.push(RejectedRow { line_number, error });
                continue;
            }
        };

        if record.iter().all(|value| value.trim().is_empty()) {
            continue;
        }

        let line_number = record.position().map_or(header_line, doc_line);
        let key = parse_row_key(&record, names.len(), key_index).and_then(|key| {
            if seen.insert(key) {
                Ok(key)
            } else {
                Err(load_error!(
                    ErrorKind::InvalidData,
                    "Duplicate key in table",
                    key
                ))
            }
        });

        match key {
            Ok(key) => {
                keys.push(key);
                raw_rows.push(record);
            }
            Err(error) => {
                warn!(
                    line = line_number,
                    error = error.description(),
                    detail = ?error.detail(),
                    "dropping table row"
                );
                rejected_rows.push(RejectedRow { line_number, error });
            }
        }
    }

    let kinds: Vec<ColumnKind> = (0..names.len())
        .map(|index| {
            if index == key_index {
                ColumnKind::Timestamp
            } else {
                infer_kind(raw_rows.iter().map(|record| field(record, index)))
            }
        })
        .collect();

    let rows: Vec<TableRow> = raw_rows
        .iter()
        .zip(keys)
        .map(|(record, key)| {
            let values = kinds
                .iter()
                .enumerate()
                .map(|(index, kind)| {
                    if index == key_index {
                        Cell::Timestamp(key)
                    } else {
                        typed_cell(field(record, index), *kind)
                    }
                })
                .collect();
            TableRow::new(values)
        })
        .collect();

    let columns = names
        .into_iter()
        .zip(&kinds)
        .map(|(name, kind)| ColumnSchema::new(name, *kind))
        .collect();

    TableExtraction::Table(ExtractedTable {
        header_line,
        batch: RecordBatch::from_aligned(columns, rows),
        rejected_rows,
    })
}

/// Parses a timestamp in any of the layouts emitted by logger exports.
pub fn parse_timestamp(value: &str) -> LoadResult<NaiveDateTime> {
    let value = value.trim();

    let mut last_error = None;
    for format in TIMESTAMP_FORMATS {
        match NaiveDateTime::parse_from_str(value, format) {
            Ok(timestamp) => return Ok(timestamp),
            Err(err) => last_error = Some(err),
        }
    }

    match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        Ok(date) => Ok(date.and_time(chrono::NaiveTime::MIN)),
        Err(err) => Err(last_error.unwrap_or(err).into()),
    }
}

/// Trims header names, names empty ones `Unnamed: {index}` and suffixes repeated ones with
/// `.1`, `.2`, ...
fn header_names(headers: &StringRecord) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();

    for (index, raw) in headers.iter().enumerate() {
        let base = match raw.trim() {
            "" => format!("{UNNAMED_COLUMN_PREFIX}{index}"),
            trimmed => trimmed.to_owned(),
        };
        let mut name = base.clone();
        let mut suffix = 0;
        while names.contains(&name) {
            suffix += 1;
            name = format!("{base}.{suffix}");
        }
        names.push(name);
    }

    names
}

fn parse_row_key(record: &StringRecord, width: usize, key_index: usize) -> LoadResult<NaiveDateTime> {
    if record.len() > width {
        return Err(load_error!(
            ErrorKind::InvalidData,
            "Row has more fields than the header",
            format!("{} fields, {width} columns", record.len())
        ));
    }

    let raw = field(record, key_index);
    if raw.is_empty() {
        return Err(load_error!(ErrorKind::ConversionError, "Empty key value"));
    }

    parse_timestamp(raw)
}

/// Returns the trimmed field at `index`, or an empty string for a short row.
fn field(record: &StringRecord, index: usize) -> &str {
    record.get(index).map(str::trim).unwrap_or("")
}

fn infer_kind<'a>(values: impl Iterator<Item = &'a str>) -> ColumnKind {
    values
        .filter(|value| !value.is_empty())
        .map(|value| {
            if value.parse::<i64>().is_ok() {
                ColumnKind::Integer
            } else if value.parse::<f64>().is_ok() {
                ColumnKind::Float
            } else {
                ColumnKind::Text
            }
        })
        .reduce(ColumnKind::widen)
        .unwrap_or(ColumnKind::Text)
}

fn typed_cell(value: &str, kind: ColumnKind) -> Cell {
    if value.is_empty() {
        return Cell::Null;
    }

    let parsed = match kind {
        ColumnKind::Integer => value.parse().ok().map(Cell::Integer),
        ColumnKind::Float => value.parse().ok().map(Cell::Float),
        ColumnKind::Timestamp => parse_timestamp(value).ok().map(Cell::Timestamp),
        ColumnKind::Text => None,
    };

    parsed.unwrap_or_else(|| Cell::Text(value.to_owned()))
}
