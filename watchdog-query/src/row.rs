//! Result rows and insert payloads.
//!
//! A [`RowData`] is an ordered column → [`Value`] mapping. It is what every
//! read returns, and what inserts and updates take as input, so column order
//! in generated statements follows insertion order.
//!
//! ```rust
//! use watchdog_query::RowData;
//!
//! let row = RowData::new()
//!     .with("code", "161725")
//!     .with("price", 1.042);
//!
//! assert_eq!(row.get::<String>("code").unwrap(), "161725");
//! assert_eq!(row.columns().collect::<Vec<_>>(), vec!["code", "price"]);
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{DbError, DbResult, ValidationErrorKind};
use crate::value::{FromValue, Value};

/// An ordered mapping from column name to value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowData(IndexMap<String, Value>);

impl RowData {
    /// Create an empty row.
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    /// Create an empty row with room for `capacity` columns.
    pub fn with_capacity(capacity: usize) -> Self {
        Self(IndexMap::with_capacity(capacity))
    }

    /// Builder-style insert.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(column, value);
        self
    }

    /// Set a column, replacing any previous value but keeping its position.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(column.into(), value.into())
    }

    /// Get the raw value of a column.
    pub fn value(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    /// Get a column converted to `T`.
    pub fn get<T: FromValue>(&self, column: &str) -> DbResult<T> {
        match self.0.get(column) {
            Some(value) => T::from_value(value).map_err(|e| match e {
                DbError::Validation(mut v) => {
                    v.message = format!("column '{}': {}", column, v.message);
                    DbError::Validation(v)
                }
                other => other,
            }),
            None => Err(DbError::validation(
                ValidationErrorKind::MissingColumn,
                format!("column '{}' not found in row", column),
            )),
        }
    }

    /// Remove a column.
    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.0.shift_remove(column)
    }

    /// Check if the row has a column.
    pub fn contains(&self, column: &str) -> bool {
        self.0.contains_key(column)
    }

    /// Column names in order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Values in column order.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.0.values()
    }

    /// `(column, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check whether `other` has exactly the same column names, in any order.
    pub fn same_columns(&self, other: &RowData) -> bool {
        self.len() == other.len() && self.0.keys().all(|k| other.0.contains_key(k))
    }

    /// Consume the row into its underlying map.
    pub fn into_inner(self) -> IndexMap<String, Value> {
        self.0
    }
}

impl From<IndexMap<String, Value>> for RowData {
    fn from(map: IndexMap<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for RowData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl IntoIterator for RowData {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a RowData {
    type Item = (&'a String, &'a Value);
    type IntoIter = indexmap::map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Build a [`RowData`] from `column => value` pairs.
///
/// ```rust
/// use watchdog_query::row;
///
/// let r = row! { "code" => "A", "volume" => 10 };
/// assert_eq!(r.len(), 2);
/// ```
#[macro_export]
macro_rules! row {
    () => { $crate::row::RowData::new() };
    ($($col:expr => $val:expr),+ $(,)?) => {{
        let mut row = $crate::row::RowData::new();
        $( row.insert($col, $val); )+
        row
    }};
}
