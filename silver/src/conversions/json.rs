use serde_json::{Map, Value};

use crate::types::{Cell, Record};

/// Converts a JSON value to a [`Cell`].
///
/// Integral numbers that fit an `i64` become [`Cell::I64`], every other number becomes
/// [`Cell::F64`]. Objects and arrays are kept as [`Cell::Json`].
pub fn json_to_cell(value: Value) -> Cell {
    match value {
        Value::Null => Cell::Null,
        Value::Bool(v) => Cell::Bool(v),
        Value::Number(n) => match n.as_i64() {
            Some(v) => Cell::I64(v),
            None => n.as_f64().map(Cell::F64).unwrap_or(Cell::Null),
        },
        Value::String(v) => Cell::String(v),
        value @ (Value::Array(_) | Value::Object(_)) => Cell::Json(value),
    }
}

/// Converts a JSON object to a [`Record`].
///
/// Columns follow the iteration order of [`Map`], which is sorted by key.
pub fn json_object_to_record(object: Map<String, Value>) -> Record {
    object
        .into_iter()
        .map(|(column, value)| (column, json_to_cell(value)))
        .collect()
}

/// Converts a [`Cell`] back to JSON, temporal values are rendered as strings.
pub fn cell_to_json(cell: &Cell) -> Value {
    match cell {
        Cell::Null => Value::Null,
        Cell::Bool(v) => Value::Bool(*v),
        Cell::I64(v) => Value::from(*v),
        Cell::F64(v) => serde_json::Number::from_f64(*v)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Cell::String(v) => Value::String(v.clone()),
        Cell::Date(_) | Cell::Timestamp(_) | Cell::TimestampTz(_) => Value::String(cell.to_string()),
        Cell::Json(v) => v.clone(),
    }
}

/// Converts a [`Record`] to a JSON object.
pub fn record_to_json(record: &Record) -> Value {
    Value::Object(
        record
            .iter()
            .map(|(column, cell)| (column.to_string(), cell_to_json(cell)))
            .collect(),
    )
}
