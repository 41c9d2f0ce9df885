//! Conversion between [`Value`] and `mysql_async` values.

use std::str::FromStr;

use chrono::{Datelike, NaiveDate, Timelike};
use mysql_async::consts::ColumnType;
use mysql_async::{Column, Params, Row};
use rust_decimal::Decimal;

use watchdog_query::{DbResult, RowData, Value, validation_error};

/// Character set number MySQL reports for binary columns.
const BINARY_CHARSET: u16 = 63;

/// Convert a bound parameter.
///
/// Lists and raw fragments are rendered into SQL text by the statement
/// builder and can never be bound.
pub fn to_mysql(value: &Value) -> DbResult<mysql_async::Value> {
    Ok(match value {
        Value::Null => mysql_async::Value::NULL,
        Value::Bool(b) => mysql_async::Value::Int(i64::from(*b)),
        Value::Int(i) => mysql_async::Value::Int(*i),
        Value::Float(f) => mysql_async::Value::Double(*f),
        Value::Decimal(d) => mysql_async::Value::Bytes(d.to_string().into_bytes()),
        Value::String(s) => mysql_async::Value::Bytes(s.clone().into_bytes()),
        Value::Bytes(b) => mysql_async::Value::Bytes(b.clone()),
        Value::Date(d) => mysql_async::Value::Date(
            d.year() as u16,
            d.month() as u8,
            d.day() as u8,
            0,
            0,
            0,
            0,
        ),
        Value::DateTime(dt) => mysql_async::Value::Date(
            dt.year() as u16,
            dt.month() as u8,
            dt.day() as u8,
            dt.hour() as u8,
            dt.minute() as u8,
            dt.second() as u8,
            dt.nanosecond() / 1_000,
        ),
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
pub fn to_params(values: &[Value]) -> DbResult<Params> {
    if values.is_empty() {
        return Ok(Params::Empty);
    }
    values
        .iter()
        .map(to_mysql)
        .collect::<DbResult<Vec<_>>>()
        .map(Params::Positional)
}

/// Convert a column value, using the column metadata to tell dates from
/// datetimes and text from binary.
pub fn from_mysql(value: mysql_async::Value, column: &Column) -> Value {
    match value {
        mysql_async::Value::NULL => Value::Null,
        mysql_async::Value::Int(i) => Value::Int(i),
        mysql_async::Value::UInt(u) => match i64::try_from(u) {
            Ok(i) => Value::Int(i),
            Err(_) => Value::Decimal(Decimal::from(u)),
        },
        mysql_async::Value::Float(f) => Value::Float(f64::from(f)),
        mysql_async::Value::Double(d) => Value::Float(d),
        mysql_async::Value::Date(year, month, day, hour, minute, second, micro) => {
            let Some(date) = NaiveDate::from_ymd_opt(i32::from(year), u32::from(month), u32::from(day))
            else {
                // Zero dates
                return Value::Null;
            };
            if column.column_type() == ColumnType::MYSQL_TYPE_DATE {
                Value::Date(date)
            } else {
                date.and_hms_micro_opt(
                    u32::from(hour),
                    u32::from(minute),
                    u32::from(second),
                    micro,
                )
                .map(Value::DateTime)
                .unwrap_or(Value::Date(date))
            }
        }
        mysql_async::Value::Time(negative, days, hours, minutes, seconds, micro) => {
            let sign = if negative { "-" } else { "" };
            Value::String(format!(
                "{}{:02}:{:02}:{:02}.{:06}",
                sign,
                days * 24 + u32::from(hours),
                minutes,
                seconds,
                micro
            ))
        }
        mysql_async::Value::Bytes(bytes) => from_bytes(bytes, column),
    }
}

fn from_bytes(bytes: Vec<u8>, column: &Column) -> Value {
    match column.column_type() {
        ColumnType::MYSQL_TYPE_DECIMAL | ColumnType::MYSQL_TYPE_NEWDECIMAL => {
            match std::str::from_utf8(&bytes).ok().and_then(|s| Decimal::from_str(s).ok()) {
                Some(d) => Value::Decimal(d),
                None => Value::String(String::from_utf8_lossy(&bytes).into_owned()),
            }
        }
        _ if column.character_set() == BINARY_CHARSET => Value::Bytes(bytes),
        _ => match String::from_utf8(bytes) {
            Ok(s) => Value::String(s),
            Err(err) => Value::Bytes(err.into_bytes()),
        },
    }
}

/// Convert a result row, keeping the server's column order.
pub fn row_from_mysql(mut row: Row) -> RowData {
    let columns = row.columns();
    let mut data = RowData::with_capacity(columns.len());
    for (index, column) in columns.iter().enumerate() {
        let value = row
            .take::<mysql_async::Value, usize>(index)
            .unwrap_or(mysql_async::Value::NULL);
        data.insert(column.name_str().into_owned(), from_mysql(value, column));
    }
    data
}
