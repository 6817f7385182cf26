use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::NaiveDateTime;

use crate::types::ColumnKind;

/// A single typed value of a [`crate::types::TableRow`].
///
/// Kinds are settled once at extraction time and carried unchanged through reconciliation and
/// insertion.
#[derive(Debug, Clone)]
pub enum Cell {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Timestamp(NaiveDateTime),
}

impl Cell {
    /// Returns the [`ColumnKind`] of this value, or [`None`] for [`Cell::Null`].
    pub fn kind(&self) -> Option<ColumnKind> {
        match self {
            Cell::Null => None,
            Cell::Integer(_) => Some(ColumnKind::Integer),
            Cell::Float(_) => Some(ColumnKind::Float),
            Cell::Text(_) => Some(ColumnKind::Text),
            Cell::Timestamp(_) => Some(ColumnKind::Timestamp),
        }
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Cell::Null, Cell::Null) => true,
            (Cell::Integer(a), Cell::Integer(b)) => a == b,
            (Cell::Float(a), Cell::Float(b)) => a.to_bits() == b.to_bits(),
            (Cell::Text(a), Cell::Text(b)) => a == b,
            (Cell::Timestamp(a), Cell::Timestamp(b)) => a == b,
            _ => false,
        }
    }
}

// Floats compare by bit pattern, which makes the relation reflexive.
impl Eq for Cell {}

impl Hash for Cell {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Cell::Null => {}
            Cell::Integer(value) => value.hash(state),
            Cell::Float(value) => value.to_bits().hash(state),
            Cell::Text(value) => value.hash(state),
            Cell::Timestamp(value) => value.hash(state),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => write!(f, "NULL"),
            Cell::Integer(value) => write!(f, "{value}"),
            Cell::Float(value) => write!(f, "{value}"),
            Cell::Text(value) => write!(f, "{value}"),
            Cell::Timestamp(value) => write!(f, "{}", value.format("%Y-%m-%d %H:%M:%S%.f")),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_owned())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Integer(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Float(value)
    }
}

impl From<NaiveDateTime> for Cell {
    fn from(value: NaiveDateTime) -> Self {
        Cell::Timestamp(value)
    }
}
