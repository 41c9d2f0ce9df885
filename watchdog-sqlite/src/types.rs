//! Conversion between [`Value`] and SQLite values.

use rusqlite::types::{Value as SqlValue, ValueRef};

use watchdog_query::{DbResult, RowData, Value, validation_error};

/// Convert a bound parameter.
///
/// Dates are stored as ISO-8601 text, decimals as their exact decimal text.
pub fn to_sqlite(value: &Value) -> DbResult<SqlValue> {
    Ok(match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Int(i) => SqlValue::Integer(*i),
        Value::Float(f) => SqlValue::Real(*f),
        Value::Decimal(d) => SqlValue::Text(d.to_string()),
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Bytes(b) => SqlValue::Blob(b.clone()),
        Value::Date(d) => SqlValue::Text(d.format("%Y-%m-%d").to_string()),
        Value::DateTime(dt) => SqlValue::Text(dt.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
        Value::List(_) | Value::Raw(_) => {
            return Err(validation_error!(
                TypeMismatch,
                "{} value cannot be bound as a parameter",
                value.type_name()
            ));
        }
    })
}

/// Convert a parameter list.
pub fn to_params(values: &[Value]) -> DbResult<Vec<SqlValue>> {
    values.iter().map(to_sqlite).collect()
}

/// Convert a column value.
pub fn from_sqlite(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Bytes(bytes.to_vec()),
    }
}

/// Read every column of `row`, in statement order.
pub fn read_row(row: &rusqlite::Row<'_>, columns: &[String]) -> rusqlite::Result<RowData> {
    let mut data = RowData::with_capacity(columns.len());
    for (index, column) in columns.iter().enumerate() {
        data.insert(column.clone(), from_sqlite(row.get_ref(index)?));
    }
    Ok(data)
}
