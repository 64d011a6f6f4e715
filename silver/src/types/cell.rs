use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single column value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Cell {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    String(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Json(serde_json::Value),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Returns a short name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Cell::Null => "null",
            Cell::Bool(_) => "boolean",
            Cell::I64(_) => "integer",
            Cell::F64(_) => "double",
            Cell::String(_) => "string",
            Cell::Date(_) => "date",
            Cell::Timestamp(_) => "timestamp",
            Cell::TimestampTz(_) => "timestamptz",
            Cell::Json(_) => "json",
        }
    }

    /// Orders two cells for sequencing and comparisons.
    ///
    /// Integers and doubles compare numerically with each other, every other variant only
    /// compares with itself. Returns [`None`] when either side is null, when the variants are not
    /// comparable or when a double is NaN.
    pub fn sequence_cmp(&self, other: &Cell) -> Option<Ordering> {
        match (self, other) {
            (Cell::Bool(a), Cell::Bool(b)) => Some(a.cmp(b)),
            (Cell::I64(a), Cell::I64(b)) => Some(a.cmp(b)),
            (Cell::F64(a), Cell::F64(b)) => a.partial_cmp(b),
            (Cell::I64(a), Cell::F64(b)) => (*a as f64).partial_cmp(b),
            (Cell::F64(a), Cell::I64(b)) => a.partial_cmp(&(*b as f64)),
            (Cell::String(a), Cell::String(b)) => Some(a.cmp(b)),
            (Cell::Date(a), Cell::Date(b)) => Some(a.cmp(b)),
            (Cell::Timestamp(a), Cell::Timestamp(b)) => Some(a.cmp(b)),
            (Cell::TimestampTz(a), Cell::TimestampTz(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Feeds the value into `state` so that equal cells hash equally.
    ///
    /// Doubles hash by bit pattern.
    pub fn hash_into<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);

        match self {
            Cell::Null => {}
            Cell::Bool(v) => v.hash(state),
            Cell::I64(v) => v.hash(state),
            Cell::F64(v) => v.to_bits().hash(state),
            Cell::String(v) => v.hash(state),
            Cell::Date(v) => v.hash(state),
            Cell::Timestamp(v) => v.hash(state),
            Cell::TimestampTz(v) => v.hash(state),
            Cell::Json(v) => v.to_string().hash(state),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => f.write_str("null"),
            Cell::Bool(v) => write!(f, "{v}"),
            Cell::I64(v) => write!(f, "{v}"),
            Cell::F64(v) => write!(f, "{v}"),
            Cell::String(v) => f.write_str(v),
            Cell::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
            Cell::Timestamp(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S%.f")),
            Cell::TimestampTz(v) => write!(f, "{}", v.to_rfc3339()),
            Cell::Json(v) => write!(f, "{v}"),
        }
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Cell::Bool(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::I64(value)
    }
}

impl From<i32> for Cell {
    fn from(value: i32) -> Self {
        Cell::I64(value.into())
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::F64(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::String(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::String(value)
    }
}

impl From<NaiveDate> for Cell {
    fn from(value: NaiveDate) -> Self {
        Cell::Date(value)
    }
}

impl From<DateTime<Utc>> for Cell {
    fn from(value: DateTime<Utc>) -> Self {
        Cell::TimestampTz(value)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Cell::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_compare_across_variants() {
        assert_eq!(
            Cell::I64(2).sequence_cmp(&Cell::F64(1.5)),
            Some(Ordering::Greater)
        );
        assert_eq!(
            Cell::F64(2.0).sequence_cmp(&Cell::I64(2)),
            Some(Ordering::Equal)
        );
    }

    #[test]
    fn null_and_mismatched_variants_are_incomparable() {
        assert_eq!(Cell::Null.sequence_cmp(&Cell::Null), None);
        assert_eq!(Cell::I64(1).sequence_cmp(&Cell::Null), None);
        assert_eq!(Cell::from("1").sequence_cmp(&Cell::I64(1)), None);
        assert_eq!(Cell::F64(f64::NAN).sequence_cmp(&Cell::F64(1.0)), None);
    }

    #[test]
    fn timestamps_order_chronologically() {
        let earlier = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let later = DateTime::from_timestamp(1_700_000_001, 0).unwrap();

        assert_eq!(
            Cell::from(earlier).sequence_cmp(&Cell::from(later)),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn serializes_with_type_tag() {
        let json = serde_json::to_string(&Cell::I64(7)).unwrap();
        assert_eq!(json, r#"{"type":"i64","value":7}"#);

        let cell: Cell = serde_json::from_str(r#"{"type":"null"}"#).unwrap();
        assert_eq!(cell, Cell::Null);
    }
}
