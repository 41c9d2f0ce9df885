//! Filter expressions for building WHERE clauses.
//!
//! Filters come in two shapes:
//!
//! - [`FilterExpression`], the typed tree the compiler consumes.
//! - [`FilterMap`], the shorthand `column → condition` mapping callers write
//!   by hand (or send as JSON). It is lowered into a [`FilterExpression`]
//!   before compilation.
//!
//! ```rust
//! use watchdog_query::{filter, FilterExpression, Value};
//!
//! let shorthand = filter! {
//!     "age" => (">", 18),
//!     "OR" => [filter! { "status" => "active" }, filter! { "status" => "trial" }],
//! };
//!
//! let typed = FilterExpression::and([
//!     FilterExpression::gt("age", 18),
//!     FilterExpression::or([
//!         FilterExpression::eq("status", "active"),
//!         FilterExpression::eq("status", "trial"),
//!     ]),
//! ]);
//!
//! assert_eq!(shorthand.lower().unwrap(), Some(typed));
//! ```

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

use crate::error::{DbError, DbResult, ValidationErrorKind};
use crate::value::Value;

/// Comparison operators other than equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    /// `!=` / `<>`
    Ne,
    /// `>`
    Gt,
    /// `<`
    Lt,
    /// `>=`
    Gte,
    /// `<=`
    Lte,
}

impl CompareOp {
    /// SQL token for this operator.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Gte => ">=",
            Self::Lte => "<=",
        }
    }
}

/// `IN` or `NOT IN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetMode {
    /// `IN (...)`
    In,
    /// `NOT IN (...)`
    NotIn,
}

impl SetMode {
    /// SQL token for this mode.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::In => "IN",
            Self::NotIn => "NOT IN",
        }
    }
}

/// `LIKE` or `NOT LIKE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternMode {
    /// `LIKE`
    Like,
    /// `NOT LIKE`
    NotLike,
}

impl PatternMode {
    /// SQL token for this mode.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
        }
    }
}

/// `IS NULL` or `IS NOT NULL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NullMode {
    /// `IS NULL`
    IsNull,
    /// `IS NOT NULL`
    IsNotNull,
}

impl NullMode {
    /// SQL token for this mode.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::IsNull => "IS NULL",
            Self::IsNotNull => "IS NOT NULL",
        }
    }
}

/// A declarative description of which rows an operation applies to.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpression {
    /// `column = value`. A `Null` value compiles to `column IS NULL`.
    Equals(String, Value),
    /// `column <op> value`.
    Compare(String, CompareOp, Value),
    /// `column IN (...)` / `column NOT IN (...)`, values must be non-empty.
    SetMembership(String, SetMode, Vec<Value>),
    /// `column LIKE pattern` / `column NOT LIKE pattern`.
    Pattern(String, PatternMode, Value),
    /// `column BETWEEN low AND high`.
    Range {
        /// Column name.
        column: String,
        /// Inclusive lower bound.
        low: Value,
        /// Inclusive upper bound.
        high: Value,
    },
    /// `column IS NULL` / `column IS NOT NULL`.
    Nullness(String, NullMode),
    /// All sub-expressions must hold.
    Conjunction(Vec<FilterExpression>),
    /// At least one sub-expression must hold.
    Disjunction(Vec<FilterExpression>),
    /// A literal SQL fragment, emitted verbatim and never parameterized.
    Raw(String),
}

impl FilterExpression {
    /// `column = value`
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Equals(column.into(), value.into())
    }

    /// `column != value`
    pub fn ne(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Compare(column.into(), CompareOp::Ne, value.into())
    }

    /// `column > value`
    pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Compare(column.into(), CompareOp::Gt, value.into())
    }

    /// `column < value`
    pub fn lt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Compare(column.into(), CompareOp::Lt, value.into())
    }

    /// `column >= value`
    pub fn gte(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Compare(column.into(), CompareOp::Gte, value.into())
    }

    /// `column <= value`
    pub fn lte(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Compare(column.into(), CompareOp::Lte, value.into())
    }

    /// `column IN (values...)`
    pub fn in_list<V: Into<Value>>(
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::SetMembership(
            column.into(),
            SetMode::In,
            values.into_iter().map(Into::into).collect(),
        )
    }

    /// `column NOT IN (values...)`
    pub fn not_in<V: Into<Value>>(
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::SetMembership(
            column.into(),
            SetMode::NotIn,
            values.into_iter().map(Into::into).collect(),
        )
    }

    /// `column LIKE pattern`
    pub fn like(column: impl Into<String>, pattern: impl Into<Value>) -> Self {
        Self::Pattern(column.into(), PatternMode::Like, pattern.into())
    }

    /// `column NOT LIKE pattern`
    pub fn not_like(column: impl Into<String>, pattern: impl Into<Value>) -> Self {
        Self::Pattern(column.into(), PatternMode::NotLike, pattern.into())
    }

    /// `column BETWEEN low AND high`
    pub fn between(
        column: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        Self::Range {
            column: column.into(),
            low: low.into(),
            high: high.into(),
        }
    }

    /// `column IS NULL`
    pub fn is_null(column: impl Into<String>) -> Self {
        Self::Nullness(column.into(), NullMode::IsNull)
    }

    /// `column IS NOT NULL`
    pub fn is_not_null(column: impl Into<String>) -> Self {
        Self::Nullness(column.into(), NullMode::IsNotNull)
    }

    /// A literal SQL fragment. Must not carry user-controlled text.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::Raw(sql.into())
    }

    /// Conjoin expressions. A single expression is returned unwrapped.
    pub fn and(filters: impl IntoIterator<Item = FilterExpression>) -> Self {
        let mut filters: Vec<_> = filters.into_iter().collect();
        if filters.len() == 1 {
            if let Some(only) = filters.pop() {
                return only;
            }
        }
        Self::Conjunction(filters)
    }

    /// Disjoin expressions. A single expression is returned unwrapped.
    pub fn or(filters: impl IntoIterator<Item = FilterExpression>) -> Self {
        let mut filters: Vec<_> = filters.into_iter().collect();
        if filters.len() == 1 {
            if let Some(only) = filters.pop() {
                return only;
            }
        }
        Self::Disjunction(filters)
    }

    /// Combine with another expression using AND.
    pub fn and_then(self, other: FilterExpression) -> Self {
        match self {
            Self::Conjunction(mut filters) => {
                filters.push(other);
                Self::Conjunction(filters)
            }
            _ => Self::Conjunction(vec![self, other]),
        }
    }

    /// Combine with another expression using OR.
    pub fn or_else(self, other: FilterExpression) -> Self {
        match self {
            Self::Disjunction(mut filters) => {
                filters.push(other);
                Self::Disjunction(filters)
            }
            _ => Self::Disjunction(vec![self, other]),
        }
    }

    /// Check if this expression constrains nothing (an empty group).
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Conjunction(f) | Self::Disjunction(f) if f.is_empty())
    }

    /// Column named by a leaf expression.
    pub fn column(&self) -> Option<&str> {
        match self {
            Self::Equals(c, _)
            | Self::Compare(c, _, _)
            | Self::SetMembership(c, _, _)
            | Self::Pattern(c, _, _)
            | Self::Nullness(c, _) => Some(c),
            Self::Range { column, .. } => Some(column),
            Self::Conjunction(_) | Self::Disjunction(_) | Self::Raw(_) => None,
        }
    }
}

/// One condition in a [`FilterMap`].
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Bare value: equality (or `IS NULL` for `Null`).
    Value(Value),
    /// Operator tuple such as `(">", 18)` or `("BETWEEN", a, b)`.
    Op {
        /// Operator token, matched case-insensitively.
        operator: String,
        /// Operands following the operator.
        operands: Vec<Value>,
    },
    /// Sub-mappings under an `OR` / `AND` key.
    Group(Vec<FilterMap>),
}

impl Condition {
    /// Build an operator condition with any number of operands.
    pub fn op<V: Into<Value>>(
        operator: impl Into<String>,
        operands: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::Op {
            operator: operator.into(),
            operands: operands.into_iter().map(Into::into).collect(),
        }
    }
}

macro_rules! impl_condition_from_scalar {
    ($($t:ty),* $(,)?) => {
        $(
            impl From<$t> for Condition {
                fn from(v: $t) -> Self {
                    Self::Value(v.into())
                }
            }
        )*
    };
}

impl_condition_from_scalar!(
    Value,
    bool,
    i32,
    i64,
    u32,
    f64,
    Decimal,
    String,
    &str,
    NaiveDate,
    NaiveDateTime,
);

impl<T: Into<Value>> From<Option<T>> for Condition {
    fn from(v: Option<T>) -> Self {
        Self::Value(v.into())
    }
}

impl<'a, T: Into<Value>> From<(&'a str, T)> for Condition {
    fn from((op, operand): (&'a str, T)) -> Self {
        Self::Op {
            operator: op.to_string(),
            operands: vec![operand.into()],
        }
    }
}

impl<'a, A: Into<Value>, B: Into<Value>> From<(&'a str, A, B)> for Condition {
    fn from((op, a, b): (&'a str, A, B)) -> Self {
        Self::Op {
            operator: op.to_string(),
            operands: vec![a.into(), b.into()],
        }
    }
}

impl From<Vec<FilterMap>> for Condition {
    fn from(groups: Vec<FilterMap>) -> Self {
        Self::Group(groups)
    }
}

impl<const N: usize> From<[FilterMap; N]> for Condition {
    fn from(groups: [FilterMap; N]) -> Self {
        Self::Group(groups.into())
    }
}

/// Shorthand filter: an ordered `column → condition` mapping.
///
/// Keys conjoin with AND in insertion order. The keys `OR` and `AND`
/// (any case) take a list of sub-mappings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterMap {
    entries: Vec<(String, Condition)>,
}

impl FilterMap {
    /// Create an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a condition. Re-inserting a key replaces its condition in place.
    pub fn insert(&mut self, key: impl Into<String>, condition: impl Into<Condition>) {
        let key = key.into();
        let condition = condition.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = condition,
            None => self.entries.push((key, condition)),
        }
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, condition: impl Into<Condition>) -> Self {
        self.insert(key, condition);
        self
    }

    /// Check if the mapping has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Condition)> {
        self.entries.iter().map(|(k, c)| (k.as_str(), c))
    }

    /// Parse a JSON object.
    ///
    /// Scalars are bare values, arrays are operator tuples (`[">", 18]`), and
    /// `OR` / `AND` keys take an array of objects.
    ///
    /// ```rust
    /// use watchdog_query::FilterMap;
    ///
    /// let json = serde_json::json!({"age": [">", 18], "OR": [{"status": "active"}]});
    /// let filter = FilterMap::from_json(&json).unwrap();
    /// assert_eq!(filter.len(), 2);
    /// ```
    pub fn from_json(json: &serde_json::Value) -> DbResult<Self> {
        let object = json.as_object().ok_or_else(|| {
            malformed(format!("filter must be a JSON object, found {}", json_kind(json)))
        })?;

        let mut map = FilterMap::new();
        for (key, value) in object {
            let condition = match value {
                _ if is_group_key(key) && !value.is_array() => {
                    return Err(malformed(format!(
                        "'{}' takes an array of objects, found {}",
                        key.to_ascii_uppercase(),
                        json_kind(value)
                    )));
                }
                serde_json::Value::Array(items) if is_group_key(key) => {
                    let groups = items
                        .iter()
                        .map(FilterMap::from_json)
                        .collect::<DbResult<Vec<_>>>()?;
                    Condition::Group(groups)
                }
                serde_json::Value::Array(items) => {
                    let (op, operands) = items.split_first().ok_or_else(|| {
                        malformed(format!("empty operator tuple for '{}'", key))
                    })?;
                    let op = op.as_str().ok_or_else(|| {
                        malformed(format!("operator for '{}' must be a string", key))
                    })?;
                    Condition::Op {
                        operator: op.to_string(),
                        operands: operands.iter().cloned().map(Value::from).collect(),
                    }
                }
                serde_json::Value::Object(_) => {
                    return Err(malformed(format!(
                        "nested object for '{}' is not a condition",
                        key
                    )));
                }
                scalar => Condition::Value(Value::from(scalar.clone())),
            };
            map.insert(key.clone(), condition);
        }
        Ok(map)
    }

    /// Lower into a typed expression.
    ///
    /// Returns `None` for an empty mapping. Unknown operators, wrong operand
    /// counts, empty `IN` lists and empty groups are validation errors.
    pub fn lower(&self) -> DbResult<Option<FilterExpression>> {
        let mut terms = Vec::with_capacity(self.entries.len());
        for (key, condition) in &self.entries {
            terms.push(lower_entry(key, condition)?);
        }
        Ok(match terms.len() {
            0 => None,
            _ => Some(FilterExpression::and(terms)),
        })
    }
}

fn is_group_key(key: &str) -> bool {
    key.eq_ignore_ascii_case("OR") || key.eq_ignore_ascii_case("AND")
}

fn json_kind(json: &serde_json::Value) -> &'static str {
    match json {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

fn malformed(message: String) -> DbError {
    DbError::validation(ValidationErrorKind::MalformedFilter, message)
}

fn bad_operator(message: String) -> DbError {
    DbError::validation(ValidationErrorKind::InvalidOperator, message)
}

fn lower_entry(key: &str, condition: &Condition) -> DbResult<FilterExpression> {
    match condition {
        Condition::Group(groups) => {
            let disjunction = if key.eq_ignore_ascii_case("OR") {
                true
            } else if key.eq_ignore_ascii_case("AND") {
                false
            } else {
                return Err(malformed(format!(
                    "sub-filter list under '{}'; only OR and AND take groups",
                    key
                )));
            };
            if groups.is_empty() {
                return Err(DbError::validation(
                    ValidationErrorKind::EmptyValues,
                    format!("empty {} group", key.to_ascii_uppercase()),
                ));
            }
            let mut members = Vec::with_capacity(groups.len());
            for group in groups {
                match group.lower()? {
                    Some(expr) => members.push(expr),
                    None => {
                        return Err(DbError::validation(
                            ValidationErrorKind::EmptyValues,
                            format!("empty sub-filter in {} group", key.to_ascii_uppercase()),
                        ));
                    }
                }
            }
            Ok(if disjunction {
                FilterExpression::or(members)
            } else {
                FilterExpression::and(members)
            })
        }
        _ if is_group_key(key) => Err(malformed(format!(
            "'{}' takes a list of sub-filters",
            key.to_ascii_uppercase()
        ))),
        Condition::Value(value) => Ok(FilterExpression::Equals(key.to_string(), value.clone())),
        Condition::Op { operator, operands } => lower_operator(key, operator, operands),
    }
}

fn normalize_operator(op: &str) -> String {
    op.split_whitespace()
        .map(str::to_ascii_uppercase)
        .collect::<Vec<_>>()
        .join(" ")
}

fn lower_operator(column: &str, operator: &str, operands: &[Value]) -> DbResult<FilterExpression> {
    let op = normalize_operator(operator);
    let column = column.to_string();

    let single = |operands: &[Value]| -> DbResult<Value> {
        match operands {
            [v] => Ok(v.clone()),
            _ => Err(bad_operator(format!(
                "operator '{}' on '{}' takes one operand, got {}",
                op,
                column,
                operands.len()
            ))),
        }
    };

    let compare = |cmp: CompareOp| -> DbResult<FilterExpression> {
        Ok(FilterExpression::Compare(column.clone(), cmp, single(operands)?))
    };

    match op.as_str() {
        "=" => Ok(FilterExpression::Equals(column.clone(), single(operands)?)),
        "!=" | "<>" => compare(CompareOp::Ne),
        ">" => compare(CompareOp::Gt),
        "<" => compare(CompareOp::Lt),
        ">=" => compare(CompareOp::Gte),
        "<=" => compare(CompareOp::Lte),
        "IN" | "NOT IN" => {
            let mode = if op == "IN" { SetMode::In } else { SetMode::NotIn };
            let values = match operands {
                [Value::List(values)] => values.clone(),
                values => values.to_vec(),
            };
            if values.is_empty() {
                return Err(DbError::validation(
                    ValidationErrorKind::EmptyValues,
                    format!("{} on '{}' needs at least one value", op, column),
                ));
            }
            Ok(FilterExpression::SetMembership(column.clone(), mode, values))
        }
        "LIKE" => Ok(FilterExpression::Pattern(
            column.clone(),
            PatternMode::Like,
            single(operands)?,
        )),
        "NOT LIKE" => Ok(FilterExpression::Pattern(
            column.clone(),
            PatternMode::NotLike,
            single(operands)?,
        )),
        "BETWEEN" => match operands {
            [low, high] => Ok(FilterExpression::between(column.clone(), low.clone(), high.clone())),
            [Value::List(bounds)] if bounds.len() == 2 => Ok(FilterExpression::between(
                column.clone(),
                bounds[0].clone(),
                bounds[1].clone(),
            )),
            _ => Err(bad_operator(format!(
                "BETWEEN on '{}' takes exactly two operands, got {}",
                column,
                operands.len()
            ))),
        },
        "IS" | "IS NOT" => match operands {
            [Value::Null] => Ok(FilterExpression::Nullness(
                column.clone(),
                if op == "IS" {
                    NullMode::IsNull
                } else {
                    NullMode::IsNotNull
                },
            )),
            _ => Err(bad_operator(format!(
                "{} on '{}' only accepts NULL",
                op, column
            ))),
        },
        "IS NULL" | "IS NOT NULL" => {
            if !operands.is_empty() {
                return Err(bad_operator(format!(
                    "{} on '{}' takes no operand",
                    op, column
                )));
            }
            Ok(FilterExpression::Nullness(
                column.clone(),
                if op == "IS NULL" {
                    NullMode::IsNull
                } else {
                    NullMode::IsNotNull
                },
            ))
        }
        _ => Err(bad_operator(format!(
            "unsupported operator '{}' on '{}'",
            operator, column
        ))),
    }
}

impl fmt::Display for FilterExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equals(c, v) => write!(f, "{} = {}", c, v),
            Self::Compare(c, op, v) => write!(f, "{} {} {}", c, op.as_sql(), v),
            Self::SetMembership(c, mode, values) => {
                write!(f, "{} {} {}", c, mode.as_sql(), Value::List(values.clone()))
            }
            Self::Pattern(c, mode, v) => write!(f, "{} {} {}", c, mode.as_sql(), v),
            Self::Range { column, low, high } => {
                write!(f, "{} BETWEEN {} AND {}", column, low, high)
            }
            Self::Nullness(c, mode) => write!(f, "{} {}", c, mode.as_sql()),
            Self::Conjunction(items) | Self::Disjunction(items) => {
                let sep = if matches!(self, Self::Conjunction(_)) {
                    " AND "
                } else {
                    " OR "
                };
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(sep)?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
            Self::Raw(sql) => f.write_str(sql),
        }
    }
}

/// Anything a read or write operation accepts as its filter.
pub trait IntoFilter {
    /// Convert into an optional typed expression; `None` means no filter.
    fn into_filter(self) -> DbResult<Option<FilterExpression>>;
}

impl IntoFilter for FilterExpression {
    fn into_filter(self) -> DbResult<Option<FilterExpression>> {
        Ok(if self.is_empty() { None } else { Some(self) })
    }
}

impl IntoFilter for Option<FilterExpression> {
    fn into_filter(self) -> DbResult<Option<FilterExpression>> {
        match self {
            Some(expr) => expr.into_filter(),
            None => Ok(None),
        }
    }
}

impl IntoFilter for FilterMap {
    fn into_filter(self) -> DbResult<Option<FilterExpression>> {
        self.lower()
    }
}

impl IntoFilter for &FilterMap {
    fn into_filter(self) -> DbResult<Option<FilterExpression>> {
        self.lower()
    }
}

impl IntoFilter for () {
    fn into_filter(self) -> DbResult<Option<FilterExpression>> {
        Ok(None)
    }
}

/// Build a [`FilterMap`] from `key => condition` pairs.
///
/// ```rust
/// use watchdog_query::filter;
///
/// let f = filter! {
///     "code" => ("IN", vec!["161725", "501018"]),
///     "date" => ("BETWEEN", "2024-01-01", "2024-12-31"),
/// };
/// assert_eq!(f.len(), 2);
/// ```
#[macro_export]
macro_rules! filter {
    () => { $crate::filter::FilterMap::new() };
    ($($key:expr => $cond:expr),+ $(,)?) => {{
        let mut map = $crate::filter::FilterMap::new();
        $( map.insert($key, $cond); )+
        map
    }};
}
