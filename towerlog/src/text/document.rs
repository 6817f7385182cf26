/// The ordered lines of a decrypted export.
///
/// Line numbers are 1-based and stay stable for the lifetime of the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDocument {
    lines: Vec<String>,
}

impl TextDocument {
    pub fn from_text(text: &str) -> Self {
        Self {
            lines: text.lines().map(str::to_owned).collect(),
        }
    }

    /// Decodes the raw contents of an export file.
    ///
    /// Exports written by the decrypt utility are not guaranteed to be UTF-8, so invalid
    /// sequences are replaced rather than rejected.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self::from_text(&String::from_utf8_lossy(bytes))
    }

    /// Returns the line at the 1-based `line_number`.
    pub fn line(&self, line_number: usize) -> Option<&str> {
        line_number
            .checked_sub(1)
            .and_then(|index| self.lines.get(index))
            .map(String::as_str)
    }

    /// Iterates over `(line_number, line)` pairs starting at the 1-based `line_number`.
    pub fn lines_from(&self, line_number: usize) -> impl Iterator<Item = (usize, &str)> {
        self.lines
            .iter()
            .enumerate()
            .skip(line_number.saturating_sub(1))
            .map(|(index, line)| (index + 1, line.as_str()))
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_are_one_based() {
        let doc = TextDocument::from_text("first\r\nsecond\nthird");

        assert_eq!(doc.len(), 3);
        assert_eq!(doc.line(0), None);
        assert_eq!(doc.line(1), Some("first"));
        assert_eq!(doc.line(3), Some("third"));
        assert_eq!(doc.line(4), None);
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let doc = TextDocument::from_bytes(b"Site Number: 42\nElevation: 12\xff0\n");

        assert_eq!(doc.line(1), Some("Site Number: 42"));
        assert_eq!(doc.line(2), Some("Elevation: 12\u{fffd}0"));
    }

    #[test]
    fn lines_from_yields_line_numbers() {
        let doc = TextDocument::from_text("a\nb\nc");
        let tail: Vec<_> = doc.lines_from(2).collect();

        assert_eq!(tail, vec![(2, "b"), (3, "c")]);
    }
}
