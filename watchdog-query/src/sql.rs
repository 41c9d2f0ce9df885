//! SQL generation: dialects, identifier validation and the condition compiler.
//!
//! Everything here is pure. Statements are rendered into a [`Statement`]
//! (text plus bound parameters) and never touch a connection, so the exact
//! SQL for a given input can be asserted in tests.
//!
//! ```rust
//! use watchdog_query::{filter, sql::{compile_where, Dialect}, Value};
//!
//! let f = filter! {
//!     "age" => (">", 18),
//!     "OR" => [filter! { "status" => "active" }, filter! { "status" => "trial" }],
//! };
//! let expr = f.lower().unwrap();
//! let stmt = compile_where(Dialect::MySql, expr.as_ref()).unwrap();
//!
//! assert_eq!(stmt.sql, "WHERE `age` > ? AND (`status` = ? OR `status` = ?)");
//! assert_eq!(stmt.params, vec![Value::Int(18), "active".into(), "trial".into()]);
//! ```

use std::fmt::Write as _;

use crate::error::{DbError, DbResult, ValidationErrorKind};
use crate::filter::{CompareOp, FilterExpression, NullMode};
use crate::row::RowData;
use crate::value::Value;

/// Placeholder and identifier-quoting syntax of a database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dialect {
    /// MySQL / MariaDB: `` `name` `` identifiers, `?` placeholders.
    #[default]
    MySql,
    /// PostgreSQL: `"name"` identifiers, `$1, $2, ...` placeholders.
    Postgres,
    /// SQLite: `"name"` identifiers, `?` placeholders.
    Sqlite,
}

impl Dialect {
    /// Get the parameter placeholder for the 1-based `index`.
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Self::Postgres => format!("${}", index),
            Self::MySql | Self::Sqlite => "?".to_string(),
        }
    }

    /// Quote character wrapped around each identifier segment.
    pub fn quote_char(&self) -> char {
        match self {
            Self::MySql => '`',
            Self::Postgres | Self::Sqlite => '"',
        }
    }

    /// Validate and quote an identifier, segment by segment.
    pub fn quote_identifier(&self, name: &str) -> DbResult<String> {
        validate_identifier(name)?;
        let q = self.quote_char();
        let mut out = String::with_capacity(name.len() + 4);
        for (i, segment) in name.split('.').enumerate() {
            if i > 0 {
                out.push('.');
            }
            out.push(q);
            out.push_str(segment);
            out.push(q);
        }
        Ok(out)
    }
}

/// Check that `name` is `^[A-Za-z_][A-Za-z0-9_]*$`, optionally dotted.
///
/// Invalid names are rejected, never sanitized.
pub fn validate_identifier(name: &str) -> DbResult<()> {
    let valid_segment = |segment: &str| {
        let mut chars = segment.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            _ => false,
        }
    };

    if !name.is_empty() && name.split('.').all(valid_segment) {
        Ok(())
    } else {
        Err(DbError::validation(
            ValidationErrorKind::InvalidIdentifier,
            format!("invalid identifier: {:?}", name),
        ))
    }
}

/// A rendered statement and its positional parameters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Statement {
    /// SQL text with placeholders.
    pub sql: String,
    /// Parameters in placeholder order.
    pub params: Vec<Value>,
}

/// A statement executed once per parameter set.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchStatement {
    /// SQL text with placeholders.
    pub sql: String,
    /// One parameter set per row.
    pub batches: Vec<Vec<Value>>,
}

/// A SQL builder for constructing statements.
#[derive(Debug, Clone)]
pub struct SqlBuilder {
    dialect: Dialect,
    sql: String,
    params: Vec<Value>,
}

impl SqlBuilder {
    /// Create a new SQL builder.
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            sql: String::with_capacity(64),
            params: Vec::new(),
        }
    }

    /// The builder's dialect.
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Push a literal SQL string.
    pub fn push(&mut self, sql: impl AsRef<str>) -> &mut Self {
        self.sql.push_str(sql.as_ref());
        self
    }

    /// Push a value as a placeholder. [`Value::Raw`] is emitted verbatim instead.
    pub fn push_param(&mut self, value: Value) -> &mut Self {
        match value {
            Value::Raw(expr) => self.sql.push_str(&expr),
            value => {
                self.params.push(value);
                let placeholder = self.dialect.placeholder(self.params.len());
                self.sql.push_str(&placeholder);
            }
        }
        self
    }

    /// Push a validated, quoted identifier.
    pub fn push_identifier(&mut self, name: &str) -> DbResult<&mut Self> {
        let quoted = self.dialect.quote_identifier(name)?;
        self.sql.push_str(&quoted);
        Ok(self)
    }

    /// Push a comma-separated list of quoted identifiers.
    pub fn push_identifiers<'a>(
        &mut self,
        names: impl IntoIterator<Item = &'a str>,
    ) -> DbResult<&mut Self> {
        for (i, name) in names.into_iter().enumerate() {
            if i > 0 {
                self.sql.push_str(", ");
            }
            self.push_identifier(name)?;
        }
        Ok(self)
    }

    /// Push a filter expression (without the `WHERE` keyword).
    pub fn push_filter(&mut self, filter: &FilterExpression) -> DbResult<&mut Self> {
        validate_filter(filter)?;
        self.render(filter, Parent::Top)?;
        Ok(self)
    }

    /// Push ` WHERE <filter>` when a filter is present.
    pub fn push_where(&mut self, filter: Option<&FilterExpression>) -> DbResult<&mut Self> {
        if let Some(filter) = filter {
            self.sql.push_str(" WHERE ");
            self.push_filter(filter)?;
        }
        Ok(self)
    }

    /// Current SQL text.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Current parameters.
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Build the final statement.
    pub fn build(self) -> Statement {
        Statement {
            sql: self.sql,
            params: self.params,
        }
    }

    fn render(&mut self, filter: &FilterExpression, parent: Parent) -> DbResult<()> {
        match filter {
            FilterExpression::Equals(column, Value::Null) => {
                self.push_identifier(column)?;
                self.push(" IS NULL");
            }
            FilterExpression::Equals(column, value) => {
                self.push_identifier(column)?;
                self.push(" = ");
                self.push_param(value.clone());
            }
            FilterExpression::Compare(column, CompareOp::Ne, Value::Null) => {
                self.push_identifier(column)?;
                self.push(" IS NOT NULL");
            }
            FilterExpression::Compare(column, op, value) => {
                self.push_identifier(column)?;
                self.push(" ").push(op.as_sql()).push(" ");
                self.push_param(value.clone());
            }
            FilterExpression::SetMembership(column, mode, values) => {
                self.push_identifier(column)?;
                self.push(" ").push(mode.as_sql()).push(" (");
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.push_param(value.clone());
                }
                self.push(")");
            }
            FilterExpression::Pattern(column, mode, pattern) => {
                self.push_identifier(column)?;
                self.push(" ").push(mode.as_sql()).push(" ");
                self.push_param(pattern.clone());
            }
            FilterExpression::Range { column, low, high } => {
                self.push_identifier(column)?;
                self.push(" BETWEEN ");
                self.push_param(low.clone());
                self.push(" AND ");
                self.push_param(high.clone());
            }
            FilterExpression::Nullness(column, mode) => {
                self.push_identifier(column)?;
                self.push(" ").push(mode.as_sql());
            }
            FilterExpression::Conjunction(items) => {
                let wrap = parent == Parent::Or && items.len() > 1;
                self.render_group(items, " AND ", Parent::And, parent, wrap)?;
            }
            FilterExpression::Disjunction(items) => {
                let wrap = parent == Parent::And && items.len() > 1;
                self.render_group(items, " OR ", Parent::Or, parent, wrap)?;
            }
            FilterExpression::Raw(sql) => {
                if parent == Parent::Top {
                    self.push(sql);
                } else {
                    self.push("(").push(sql).push(")");
                }
            }
        }
        Ok(())
    }

    fn render_group(
        &mut self,
        items: &[FilterExpression],
        separator: &str,
        own: Parent,
        outer: Parent,
        wrap: bool,
    ) -> DbResult<()> {
        if wrap {
            self.push("(");
        }
        // A lone member takes the group's own position.
        let child_parent = if items.len() == 1 { outer } else { own };
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.push(separator);
            }
            self.render(item, child_parent)?;
        }
        if wrap {
            self.push(")");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Parent {
    Top,
    And,
    Or,
}

/// Check identifiers, operands and group shapes before anything is rendered.
pub fn validate_filter(filter: &FilterExpression) -> DbResult<()> {
    if let Some(column) = filter.column() {
        validate_identifier(column)?;
    }
    match filter {
        FilterExpression::Equals(column, value) => bindable(column, value),
        FilterExpression::Compare(column, op, value) => {
            if value.is_null() && *op != CompareOp::Ne {
                return Err(DbError::validation(
                    ValidationErrorKind::InvalidOperator,
                    format!("'{}' {} NULL is never true; use IS NULL", column, op.as_sql()),
                ));
            }
            bindable(column, value)
        }
        FilterExpression::SetMembership(column, mode, values) => {
            if values.is_empty() {
                return Err(DbError::validation(
                    ValidationErrorKind::EmptyValues,
                    format!("{} on '{}' needs at least one value", mode.as_sql(), column),
                ));
            }
            values.iter().try_for_each(|v| bindable(column, v))
        }
        FilterExpression::Pattern(column, _, value) => bindable(column, value),
        FilterExpression::Range { column, low, high } => {
            bindable(column, low)?;
            bindable(column, high)
        }
        FilterExpression::Nullness(_, NullMode::IsNull | NullMode::IsNotNull) => Ok(()),
        FilterExpression::Conjunction(items) | FilterExpression::Disjunction(items) => {
            if items.is_empty() {
                return Err(DbError::validation(
                    ValidationErrorKind::EmptyValues,
                    "empty AND/OR group",
                ));
            }
            items.iter().try_for_each(validate_filter)
        }
        FilterExpression::Raw(_) => Ok(()),
    }
}

fn bindable(column: &str, value: &Value) -> DbResult<()> {
    match value {
        Value::List(_) => Err(DbError::validation(
            ValidationErrorKind::InvalidOperator,
            format!("list value for '{}' outside IN / NOT IN", column),
        )),
        _ => Ok(()),
    }
}

/// Compile an optional filter into a `WHERE ...` clause.
///
/// No filter yields an empty clause and no parameters.
pub fn compile_where(dialect: Dialect, filter: Option<&FilterExpression>) -> DbResult<Statement> {
    let mut builder = SqlBuilder::new(dialect);
    if let Some(filter) = filter {
        builder.push("WHERE ");
        builder.push_filter(filter)?;
    }
    Ok(builder.build())
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortOrder {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

impl SortOrder {
    /// SQL keyword.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Ordering and pagination for a select.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectOptions {
    /// Sort keys in priority order.
    pub order_by: Vec<(String, SortOrder)>,
    /// Maximum number of rows.
    pub limit: Option<u64>,
    /// Rows to skip.
    pub offset: Option<u64>,
}

impl SelectOptions {
    /// Create empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an ascending sort key.
    pub fn asc(mut self, column: impl Into<String>) -> Self {
        self.order_by.push((column.into(), SortOrder::Asc));
        self
    }

    /// Add a descending sort key.
    pub fn desc(mut self, column: impl Into<String>) -> Self {
        self.order_by.push((column.into(), SortOrder::Desc));
        self
    }

    /// Set the row limit.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the row offset.
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }
}

fn push_pagination(builder: &mut SqlBuilder, limit: Option<u64>, offset: Option<u64>) {
    let mut tail = String::new();
    match (limit, offset, builder.dialect()) {
        (Some(limit), _, _) => {
            let _ = write!(tail, " LIMIT {}", limit);
        }
        // OFFSET requires a LIMIT on MySQL and SQLite.
        (None, Some(_), Dialect::MySql) => tail.push_str(" LIMIT 18446744073709551615"),
        (None, Some(_), Dialect::Sqlite) => tail.push_str(" LIMIT -1"),
        _ => {}
    }
    if let Some(offset) = offset {
        let _ = write!(tail, " OFFSET {}", offset);
    }
    builder.push(tail);
}

/// `SELECT cols FROM table [WHERE ...] [ORDER BY ...] [LIMIT n] [OFFSET m]`
pub fn select(
    dialect: Dialect,
    table: &str,
    columns: &[&str],
    filter: Option<&FilterExpression>,
    options: &SelectOptions,
) -> DbResult<Statement> {
    let mut b = SqlBuilder::new(dialect);
    b.push("SELECT ");
    if columns.is_empty() {
        b.push("*");
    } else {
        b.push_identifiers(columns.iter().copied())?;
    }
    b.push(" FROM ");
    b.push_identifier(table)?;
    b.push_where(filter)?;
    if !options.order_by.is_empty() {
        b.push(" ORDER BY ");
        for (i, (column, order)) in options.order_by.iter().enumerate() {
            if i > 0 {
                b.push(", ");
            }
            b.push_identifier(column)?;
            b.push(" ").push(order.as_sql());
        }
    }
    push_pagination(&mut b, options.limit, options.offset);
    Ok(b.build())
}

/// `SELECT COUNT(*) AS count FROM table [WHERE ...]`
pub fn count(dialect: Dialect, table: &str, filter: Option<&FilterExpression>) -> DbResult<Statement> {
    let mut b = SqlBuilder::new(dialect);
    b.push("SELECT COUNT(*) AS count FROM ");
    b.push_identifier(table)?;
    b.push_where(filter)?;
    Ok(b.build())
}

/// `SELECT 1 FROM table [WHERE ...] LIMIT 1`
pub fn exists(dialect: Dialect, table: &str, filter: Option<&FilterExpression>) -> DbResult<Statement> {
    let mut b = SqlBuilder::new(dialect);
    b.push("SELECT 1 FROM ");
    b.push_identifier(table)?;
    b.push_where(filter)?;
    b.push(" LIMIT 1");
    Ok(b.build())
}

/// `INSERT INTO table (cols) VALUES (...)`. Raw values are emitted verbatim.
pub fn insert(dialect: Dialect, table: &str, row: &RowData) -> DbResult<Statement> {
    if row.is_empty() {
        return Err(DbError::validation(
            ValidationErrorKind::EmptyRow,
            format!("insert into '{}' with no columns", table),
        ));
    }
    let mut b = SqlBuilder::new(dialect);
    b.push("INSERT INTO ");
    b.push_identifier(table)?;
    b.push(" (");
    b.push_identifiers(row.columns())?;
    b.push(") VALUES (");
    for (i, value) in row.values().enumerate() {
        if i > 0 {
            b.push(", ");
        }
        b.push_param(value.clone());
    }
    b.push(")");
    Ok(b.build())
}

/// Shared template for multi-row inserts.
///
/// The first row fixes the column order. Every row must carry the same
/// column set, and a column holding a [`Value::Raw`] must hold the identical
/// fragment in every row (it is part of the template, not a parameter).
fn insert_template(dialect: Dialect, table: &str, rows: &[RowData]) -> DbResult<BatchStatement> {
    let Some(first) = rows.first() else {
        return Ok(BatchStatement::default());
    };
    if first.is_empty() {
        return Err(DbError::validation(
            ValidationErrorKind::EmptyRow,
            format!("insert into '{}' with no columns", table),
        ));
    }
    let columns: Vec<&str> = first.columns().collect();

    let mut b = SqlBuilder::new(dialect);
    b.push("INSERT INTO ");
    b.push_identifier(table)?;
    b.push(" (");
    b.push_identifiers(columns.iter().copied())?;
    b.push(") VALUES (");
    let mut bound = 0usize;
    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            b.push(", ");
        }
        match first.value(column) {
            Some(Value::Raw(expr)) => {
                b.push(expr);
            }
            _ => {
                bound += 1;
                b.push(dialect.placeholder(bound));
            }
        }
    }
    b.push(")");

    let mut batches = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        if !row.same_columns(first) {
            return Err(DbError::validation(
                ValidationErrorKind::MismatchedColumns,
                format!(
                    "row {} of insert into '{}' has columns {:?}, expected {:?}",
                    index,
                    table,
                    row.columns().collect::<Vec<_>>(),
                    columns
                ),
            ));
        }
        let mut params = Vec::with_capacity(bound);
        for column in &columns {
            let template = first.value(column);
            let value = row.value(column).unwrap_or(&Value::Null);
            match (template, value) {
                (Some(Value::Raw(expected)), Value::Raw(found)) if expected == found => {}
                (Some(Value::Raw(_)), _) | (_, Value::Raw(_)) => {
                    return Err(DbError::validation(
                        ValidationErrorKind::MismatchedColumns,
                        format!(
                            "raw SQL in column '{}' must be identical across all rows",
                            column
                        ),
                    ));
                }
                (_, value) => params.push(value.clone()),
            }
        }
        batches.push(params);
    }

    Ok(BatchStatement {
        sql: b.build().sql,
        batches,
    })
}

/// Multi-row insert: one statement, one parameter set per row.
///
/// An empty input yields an empty batch.
pub fn insert_many(dialect: Dialect, table: &str, rows: &[RowData]) -> DbResult<BatchStatement> {
    insert_template(dialect, table, rows)
}

/// Multi-row insert that updates `update_columns` when a row collides with
/// an existing key.
///
/// With no `update_columns`, every inserted column outside
/// `conflict_columns` is updated; if that leaves nothing, colliding rows
/// are skipped.
pub fn upsert_many(
    dialect: Dialect,
    table: &str,
    rows: &[RowData],
    conflict_columns: &[&str],
    update_columns: &[&str],
) -> DbResult<BatchStatement> {
    let mut stmt = insert_template(dialect, table, rows)?;
    let Some(first) = rows.first() else {
        return Ok(stmt);
    };
    for column in conflict_columns.iter().chain(update_columns) {
        validate_identifier(column)?;
    }
    if dialect != Dialect::MySql && conflict_columns.is_empty() {
        return Err(DbError::validation(
            ValidationErrorKind::EmptyValues,
            format!("upsert into '{}' needs conflict columns", table),
        ));
    }

    let updates: Vec<&str> = if update_columns.is_empty() {
        first
            .columns()
            .filter(|c| !conflict_columns.contains(c))
            .collect()
    } else {
        update_columns.to_vec()
    };

    let mut tail = SqlBuilder::new(dialect);
    match dialect {
        Dialect::MySql => {
            if updates.is_empty() {
                stmt.sql = stmt.sql.replacen("INSERT INTO", "INSERT IGNORE INTO", 1);
                return Ok(stmt);
            }
            tail.push(" ON DUPLICATE KEY UPDATE ");
            for (i, column) in updates.iter().enumerate() {
                if i > 0 {
                    tail.push(", ");
                }
                let quoted = dialect.quote_identifier(column)?;
                tail.push(format!("{} = VALUES({})", quoted, quoted));
            }
        }
        Dialect::Postgres | Dialect::Sqlite => {
            tail.push(" ON CONFLICT (");
            tail.push_identifiers(conflict_columns.iter().copied())?;
            tail.push(")");
            if updates.is_empty() {
                tail.push(" DO NOTHING");
            } else {
                tail.push(" DO UPDATE SET ");
                for (i, column) in updates.iter().enumerate() {
                    if i > 0 {
                        tail.push(", ");
                    }
                    let quoted = dialect.quote_identifier(column)?;
                    tail.push(format!("{} = excluded.{}", quoted, quoted));
                }
            }
        }
    }
    stmt.sql.push_str(tail.sql());
    Ok(stmt)
}

/// `UPDATE table SET ... WHERE ...`. Refuses to run without a filter.
pub fn update(
    dialect: Dialect,
    table: &str,
    values: &RowData,
    filter: Option<&FilterExpression>,
) -> DbResult<Statement> {
    let Some(filter) = filter else {
        return Err(DbError::validation(
            ValidationErrorKind::EmptyFilter,
            format!("refusing UPDATE on '{}' without a filter", table),
        ));
    };
    if values.is_empty() {
        return Err(DbError::validation(
            ValidationErrorKind::EmptyRow,
            format!("UPDATE on '{}' with no columns to set", table),
        ));
    }
    let mut b = SqlBuilder::new(dialect);
    b.push("UPDATE ");
    b.push_identifier(table)?;
    b.push(" SET ");
    for (i, (column, value)) in values.iter().enumerate() {
        if i > 0 {
            b.push(", ");
        }
        b.push_identifier(column)?;
        b.push(" = ");
        b.push_param(value.clone());
    }
    b.push_where(Some(filter))?;
    Ok(b.build())
}

/// `DELETE FROM table WHERE ...`. Refuses to run without a filter.
pub fn delete(dialect: Dialect, table: &str, filter: Option<&FilterExpression>) -> DbResult<Statement> {
    let Some(filter) = filter else {
        return Err(DbError::validation(
            ValidationErrorKind::EmptyFilter,
            format!("refusing DELETE on '{}' without a filter", table),
        ));
    };
    let mut b = SqlBuilder::new(dialect);
    b.push("DELETE FROM ");
    b.push_identifier(table)?;
    b.push_where(Some(filter))?;
    Ok(b.build())
}
