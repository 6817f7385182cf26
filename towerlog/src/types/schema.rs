/// Value kind of a column, inferred once from the extracted content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    Integer,
    Float,
    Timestamp,
    Text,
}

impl ColumnKind {
    /// Returns the narrowest kind able to hold values of both `self` and `other`.
    ///
    /// Integers widen to floats; every other mix falls back to text.
    pub fn widen(self, other: ColumnKind) -> ColumnKind {
        match (self, other) {
            (a, b) if a == b => a,
            (ColumnKind::Integer, ColumnKind::Float) | (ColumnKind::Float, ColumnKind::Integer) => {
                ColumnKind::Float
            }
            _ => ColumnKind::Text,
        }
    }
}

/// Definition of a single column of a batch or warehouse table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    pub name: String,
    pub kind: ColumnKind,
    pub primary_key: bool,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
            primary_key: false,
        }
    }

    /// Returns the same column flagged as the table's primary key.
    pub fn into_primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }
}
