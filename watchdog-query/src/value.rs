//! Scalar values bound to statements and read back from rows.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::error::{DbError, DbResult, ValidationErrorKind};

/// A scalar value that can be bound as a statement parameter or read from a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL `NULL`.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// Exact decimal value (MySQL `DECIMAL` columns).
    Decimal(Decimal),
    /// Text value.
    String(String),
    /// Binary value.
    #[serde(skip_deserializing)]
    Bytes(Vec<u8>),
    /// Calendar date.
    Date(NaiveDate),
    /// Date and time without a zone.
    DateTime(NaiveDateTime),
    /// List of values, the operand of `IN` / `NOT IN`.
    List(Vec<Value>),
    /// A literal SQL fragment emitted verbatim, e.g. `NOW()`.
    ///
    /// Raw fragments are never bound as parameters. They must not carry
    /// user-controlled text.
    #[serde(skip)]
    Raw(String),
}

impl Value {
    /// Create a raw SQL fragment.
    ///
    /// ```rust
    /// use watchdog_query::Value;
    ///
    /// let now = Value::raw("NOW()");
    /// assert!(now.is_raw());
    /// ```
    pub fn raw(expr: impl Into<String>) -> Self {
        Self::Raw(expr.into())
    }

    /// Check if this is a null value.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Check if this is a raw SQL fragment.
    pub fn is_raw(&self) -> bool {
        matches!(self, Self::Raw(_))
    }

    /// Name of the variant, used in conversion errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Decimal(_) => "decimal",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Date(_) => "date",
            Self::DateTime(_) => "datetime",
            Self::List(_) => "list",
            Self::Raw(_) => "raw",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(v) => write!(f, "{}", v),
            Self::Decimal(d) => write!(f, "{}", d),
            Self::String(s) => write!(f, "{:?}", s),
            Self::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Self::Date(d) => write!(f, "{}", d),
            Self::DateTime(dt) => write!(f, "{}", dt),
            Self::List(list) => {
                write!(f, "[")?;
                for (i, v) in list.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Self::Raw(expr) => write!(f, "{}", expr),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Self::Decimal(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Self::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Self::DateTime(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Self::Null,
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => match (n.as_i64(), n.as_u64()) {
                (Some(i), _) => Self::Int(i),
                // Above i64::MAX; exact in a decimal.
                (None, Some(u)) => Self::Decimal(Decimal::from(u)),
                (None, None) => Self::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Value::from).collect())
            }
            other => Self::String(other.to_string()),
        }
    }
}

/// Conversion from a [`Value`] read out of a row.
pub trait FromValue: Sized {
    /// Convert the value, failing when the variant does not fit.
    fn from_value(value: &Value) -> DbResult<Self>;
}

fn mismatch<T>(expected: &str, value: &Value) -> DbResult<T> {
    Err(DbError::validation(
        ValidationErrorKind::TypeMismatch,
        format!("expected {}, found {}", expected, value.type_name()),
    ))
}

impl FromValue for Value {
    fn from_value(value: &Value) -> DbResult<Self> {
        Ok(value.clone())
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> DbResult<Self> {
        match value {
            Value::Int(i) => Ok(*i),
            Value::Bool(b) => Ok(i64::from(*b)),
            Value::Decimal(d) if d.fract().is_zero() => match d.to_i64() {
                Some(i) => Ok(i),
                None => mismatch("int", value),
            },
            Value::String(s) => s.parse().or_else(|_| mismatch("int", value)),
            _ => mismatch("int", value),
        }
    }
}

impl FromValue for u64 {
    fn from_value(value: &Value) -> DbResult<Self> {
        if let Value::Decimal(d) = value {
            return d.to_u64().map_or_else(|| mismatch("unsigned int", value), Ok);
        }
        let i = i64::from_value(value)?;
        u64::try_from(i).or_else(|_| mismatch("unsigned int", value))
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> DbResult<Self> {
        match value {
            Value::Float(f) => Ok(*f),
            Value::Int(i) => Ok(*i as f64),
            Value::Decimal(d) => match d.to_f64() {
                Some(f) => Ok(f),
                None => mismatch("float", value),
            },
            Value::String(s) => s.parse().or_else(|_| mismatch("float", value)),
            _ => mismatch("float", value),
        }
    }
}

impl FromValue for Decimal {
    fn from_value(value: &Value) -> DbResult<Self> {
        match value {
            Value::Decimal(d) => Ok(*d),
            Value::Int(i) => Ok(Decimal::from(*i)),
            Value::Float(f) => Decimal::try_from(*f).or_else(|_| mismatch("decimal", value)),
            Value::String(s) => s.parse().or_else(|_| mismatch("decimal", value)),
            _ => mismatch("decimal", value),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> DbResult<Self> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Int(i) => Ok(*i != 0),
            _ => mismatch("bool", value),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> DbResult<Self> {
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Bytes(b) => String::from_utf8(b.clone()).or_else(|_| mismatch("string", value)),
            Value::Null | Value::List(_) | Value::Raw(_) => mismatch("string", value),
            other => Ok(other.to_string()),
        }
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: &Value) -> DbResult<Self> {
        match value {
            Value::Date(d) => Ok(*d),
            Value::DateTime(dt) => Ok(dt.date()),
            Value::String(s) => {
                NaiveDate::parse_from_str(s, "%Y-%m-%d").or_else(|_| mismatch("date", value))
            }
            _ => mismatch("date", value),
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: &Value) -> DbResult<Self> {
        match value {
            Value::DateTime(dt) => Ok(*dt),
            Value::String(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
                .or_else(|_| mismatch("datetime", value)),
            _ => mismatch("datetime", value),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> DbResult<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}
