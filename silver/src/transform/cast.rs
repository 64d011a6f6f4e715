use chrono::{DateTime, NaiveTime, Utc};
use silver_config::shared::CastType;
use thiserror::Error;

use crate::conversions::text::{parse_bool, parse_date, parse_timestamp};
use crate::types::Cell;

/// A value that cannot be represented in the requested type.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("cannot cast {from} value `{value}` to {to:?}")]
pub struct CastError {
    pub from: &'static str,
    pub value: String,
    pub to: CastType,
}

impl CastError {
    fn new(cell: &Cell, to: CastType) -> Self {
        Self {
            from: cell.type_name(),
            value: cell.to_string(),
            to,
        }
    }
}

/// Casts `cell` to `to`.
///
/// Null casts to null. Timestamps are produced in UTC; naive inputs are taken as UTC.
pub fn cast_cell(cell: Cell, to: CastType) -> Result<Cell, CastError> {
    if cell.is_null() {
        return Ok(Cell::Null);
    }

    let cast = match to {
        CastType::Boolean => to_bool(&cell).map(Cell::Bool),
        CastType::Integer => to_i64(&cell).map(Cell::I64),
        CastType::Double => to_f64(&cell).map(Cell::F64),
        CastType::String => Some(Cell::String(match &cell {
            Cell::String(v) => v.clone(),
            other => other.to_string(),
        })),
        CastType::Date => to_date(&cell),
        CastType::Timestamp => to_timestamp(&cell).map(Cell::TimestampTz),
    };

    cast.ok_or_else(|| CastError::new(&cell, to))
}

fn to_bool(cell: &Cell) -> Option<bool> {
    match cell {
        Cell::Bool(v) => Some(*v),
        Cell::I64(v) => Some(*v != 0),
        Cell::String(v) => parse_bool(v),
        _ => None,
    }
}

fn to_i64(cell: &Cell) -> Option<i64> {
    match cell {
        Cell::Bool(v) => Some(i64::from(*v)),
        Cell::I64(v) => Some(*v),
        Cell::F64(v) => truncate(*v),
        Cell::String(v) => {
            let v = v.trim();
            v.parse::<i64>()
                .ok()
                .or_else(|| v.parse::<f64>().ok().and_then(truncate))
        }
        _ => None,
    }
}

fn truncate(v: f64) -> Option<i64> {
    let truncated = v.trunc();
    // `i64::MAX as f64` rounds up to 2^63, which is out of range.
    (truncated.is_finite() && truncated >= i64::MIN as f64 && truncated < i64::MAX as f64)
        .then_some(truncated as i64)
}

/// Non-finite doubles have no JSON representation and are rejected.
fn to_f64(cell: &Cell) -> Option<f64> {
    let v = match cell {
        Cell::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
        Cell::I64(v) => Some(*v as f64),
        Cell::F64(v) => Some(*v),
        Cell::String(v) => v.trim().parse::<f64>().ok(),
        _ => None,
    };

    v.filter(|v| v.is_finite())
}

fn to_date(cell: &Cell) -> Option<Cell> {
    match cell {
        Cell::Date(v) => Some(Cell::Date(*v)),
        Cell::Timestamp(v) => Some(Cell::Date(v.date())),
        Cell::TimestampTz(v) => Some(Cell::Date(v.date_naive())),
        Cell::String(v) => parse_date(v).map(Cell::Date),
        _ => None,
    }
}

fn to_timestamp(cell: &Cell) -> Option<DateTime<Utc>> {
    match cell {
        Cell::Date(v) => Some(v.and_time(NaiveTime::MIN).and_utc()),
        Cell::Timestamp(v) => Some(v.and_utc()),
        Cell::TimestampTz(v) => Some(*v),
        Cell::I64(v) => DateTime::from_timestamp(*v, 0),
        Cell::String(v) => parse_timestamp(v),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn string_amount_casts_to_double() {
        assert_eq!(
            cast_cell(Cell::from("12.50"), CastType::Double),
            Ok(Cell::F64(12.5))
        );
        assert_eq!(cast_cell(Cell::I64(3), CastType::Double), Ok(Cell::F64(3.0)));
    }

    #[test]
    fn unparseable_values_fail() {
        let err = cast_cell(Cell::from("twelve"), CastType::Double).unwrap_err();
        assert_eq!(err.from, "string");
        assert_eq!(err.to, CastType::Double);

        assert!(cast_cell(Cell::from("2024-13-01"), CastType::Date).is_err());
        assert!(cast_cell(Cell::F64(f64::INFINITY), CastType::Integer).is_err());
    }

    #[test]
    fn non_finite_doubles_fail() {
        for value in ["NaN", "inf", "-infinity"] {
            assert!(cast_cell(Cell::from(value), CastType::Double).is_err());
        }
        assert!(cast_cell(Cell::F64(f64::NAN), CastType::Double).is_err());
        assert!(cast_cell(Cell::from("NaN"), CastType::Integer).is_err());
    }

    #[test]
    fn strings_cast_to_themselves() {
        assert_eq!(
            cast_cell(Cell::from("LIS"), CastType::String),
            Ok(Cell::from("LIS"))
        );
    }

    #[test]
    fn null_stays_null() {
        assert_eq!(cast_cell(Cell::Null, CastType::Date), Ok(Cell::Null));
    }

    #[test]
    fn booking_date_casts_to_date() {
        assert_eq!(
            cast_cell(Cell::from("2024-05-01"), CastType::Date),
            Ok(Cell::Date(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()))
        );
    }

    #[test]
    fn doubles_truncate_to_integers() {
        assert_eq!(cast_cell(Cell::F64(-7.9), CastType::Integer), Ok(Cell::I64(-7)));
        assert_eq!(cast_cell(Cell::from("12.5"), CastType::Integer), Ok(Cell::I64(12)));
    }

    #[test]
    fn anything_casts_to_string() {
        assert_eq!(
            cast_cell(Cell::Bool(true), CastType::String),
            Ok(Cell::from("true"))
        );
    }
}
