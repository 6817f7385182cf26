use crate::text::TextDocument;

/// A labeled line located by [`find_param`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterMatch {
    /// 1-based number of the matching line.
    pub line_number: usize,
    /// The line with the needle removed, trimmed, with inner spaces turned into underscores.
    pub value: String,
}

/// Where [`read_parameter_block`] starts reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStart<'a> {
    /// The first line containing this header text.
    Header(&'a str),
    /// An explicit 1-based line number.
    Line(usize),
}

/// A single-row mapping of parameter names to raw string values.
///
/// Entries keep the order in which they were read. Inserting an existing key replaces its value
/// in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterRecord {
    entries: Vec<(String, String)>,
}

impl ParameterRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();

        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

impl IntoIterator for ParameterRecord {
    type Item = (String, String);
    type IntoIter = std::vec::IntoIter<(String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Finds the first line containing `needle` and extracts its value.
///
/// Absence is a normal outcome and yields [`None`].
pub fn find_param(doc: &TextDocument, needle: &str) -> Option<ParameterMatch> {
    doc.lines_from(1)
        .find(|(_, line)| line.contains(needle))
        .map(|(line_number, line)| ParameterMatch {
            line_number,
            value: line.replace(needle, "").trim().replace(' ', "_"),
        })
}

/// Reads the `key: value` block following `start`.
///
/// After the start line, `skip_rows` further lines are skipped. Lines are then read until one
/// that is blank after trimming, which is not part of the block. Reaching the end of the
/// document also closes the block. Returns [`None`] when the header or line does not exist.
pub fn read_parameter_block(
    doc: &TextDocument,
    start: BlockStart<'_>,
    skip_rows: usize,
) -> Option<ParameterRecord> {
    let start_line = match start {
        BlockStart::Header(header) => find_param(doc, header)?.line_number,
        BlockStart::Line(line_number) => {
            doc.line(line_number)?;
            line_number
        }
    };

    let mut record = ParameterRecord::new();
    for (_, line) in doc.lines_from(start_line + 1 + skip_rows) {
        if line.trim().is_empty() {
            break;
        }

        let (key, value) = split_parameter(line);
        record.insert(key, value);
    }

    Some(record)
}

/// Splits a parameter line on its first colon.
///
/// The value is recovered by removing the `key:` prefix from the line rather than by splitting
/// again, so colons inside values survive. A line without a colon maps to itself.
fn split_parameter(line: &str) -> (String, String) {
    let trimmed = line.trim();
    let raw_key = trimmed.split(':').next().unwrap_or(trimmed);

    let value: String = line
        .replace(&format!("{raw_key}:"), "")
        .trim()
        .chars()
        .filter(|c| !matches!(c, '\t' | '\n' | '\r'))
        .collect();

    (raw_key.trim().to_owned(), value.trim().to_owned())
}
