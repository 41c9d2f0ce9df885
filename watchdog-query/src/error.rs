//! Error taxonomy for data-access operations.
//!
//! Every failure surfaces as a [`DbError`], whose four variants can be matched
//! independently:
//!
//! - [`ConfigurationError`]: invalid or missing connection/pool parameters.
//! - [`ConnectionError`]: acquire timeout, authentication or network failure.
//! - [`QueryError`]: the database rejected a statement. Always carries the SQL
//!   text and the bound parameters.
//! - [`ValidationError`]: caller misuse detected before any I/O.
//!
//! ```rust
//! use watchdog_query::{DbError, ValidationErrorKind};
//!
//! let err = DbError::validation(ValidationErrorKind::EmptyFilter, "refusing unconditional DELETE");
//! assert!(err.is_validation());
//! assert!(!err.is_retryable());
//! ```

use std::fmt;

use thiserror::Error;

use crate::value::Value;

/// Result type for data-access operations.
pub type DbResult<T> = Result<T, DbError>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by the data-access layer.
#[derive(Error, Debug)]
pub enum DbError {
    /// Invalid or missing configuration.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    /// Failure reaching the database or acquiring a connection.
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    /// The database rejected a statement.
    #[error(transparent)]
    Query(#[from] QueryError),
    /// Caller misuse, detected before any network call.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl DbError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(ConfigurationError {
            message: message.into(),
        })
    }

    /// Create a connection error of the given kind.
    pub fn connection(kind: ConnectionErrorKind, message: impl Into<String>) -> Self {
        Self::Connection(ConnectionError::new(kind, message))
    }

    /// Create a validation error of the given kind.
    pub fn validation(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self::Validation(ValidationError {
            kind,
            message: message.into(),
        })
    }

    /// Check if this is a configuration error.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Check if this is a connection error.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Check if this is a query error.
    pub fn is_query(&self) -> bool {
        matches!(self, Self::Query(_))
    }

    /// Check if this is a validation error.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check if this is an acquire or connect timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Connection(e) if e.kind == ConnectionErrorKind::Timeout)
    }

    /// Get the validation kind, if this is a validation error.
    pub fn validation_kind(&self) -> Option<ValidationErrorKind> {
        match self {
            Self::Validation(e) => Some(e.kind),
            _ => None,
        }
    }

    /// Get the failing SQL text, if this is a query error.
    pub fn sql(&self) -> Option<&str> {
        match self {
            Self::Query(e) => Some(&e.sql),
            _ => None,
        }
    }

    /// Check if retrying the operation may succeed.
    ///
    /// Connection timeouts and network failures are retryable, as are
    /// deadlocks and lock wait timeouts. Retry policy itself lives with the
    /// caller.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(e) => matches!(
                e.kind,
                ConnectionErrorKind::Timeout | ConnectionErrorKind::Network
            ),
            Self::Query(e) => e.is_retryable(),
            Self::Configuration(_) | Self::Validation(_) => false,
        }
    }
}

/// Invalid or missing connection/pool parameters.
#[derive(Error, Debug, Clone)]
#[error("configuration error: {message}")]
pub struct ConfigurationError {
    /// What was wrong with the configuration.
    pub message: String,
}

/// Category of a [`ConnectionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionErrorKind {
    /// No connection became available within the wait ceiling, or connecting timed out.
    Timeout,
    /// The server refused the credentials.
    Authentication,
    /// The server could not be reached or the link broke.
    Network,
    /// The pool or session was already closed.
    Closed,
}

impl fmt::Display for ConnectionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Timeout => "timeout",
            Self::Authentication => "authentication failed",
            Self::Network => "network failure",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Failure acquiring or establishing a database connection.
#[derive(Error, Debug)]
#[error("connection error ({kind}): {message}")]
pub struct ConnectionError {
    /// Error category.
    pub kind: ConnectionErrorKind,
    /// Human-readable message.
    pub message: String,
    /// Underlying driver error.
    #[source]
    pub source: Option<BoxError>,
}

impl ConnectionError {
    /// Create a new connection error.
    pub fn new(kind: ConnectionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Attach the underlying driver error.
    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

/// Classification of a statement failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Unique constraint violation (Q2001).
    UniqueConstraint = 2001,
    /// Foreign key constraint violation (Q2002).
    ForeignKeyConstraint = 2002,
    /// Not null constraint violation (Q2004).
    NotNullConstraint = 2004,
    /// Deadlock detected (Q4002).
    Deadlock = 4002,
    /// Lock wait timeout (Q4005).
    LockTimeout = 4005,
    /// Transaction could not be committed or rolled back (Q4001).
    TransactionFailed = 4001,
    /// SQL syntax error (Q5002).
    SqlSyntax = 5002,
    /// Unknown table or column (Q5006).
    UnknownObject = 5006,
    /// Value incompatible with the column type (Q6001).
    InvalidDataType = 6001,
    /// Any other database error (Q5005).
    DatabaseError = 5005,
}

impl ErrorCode {
    /// Get the error code string (e.g., "Q2001").
    pub fn code(&self) -> String {
        format!("Q{}", *self as u16)
    }

    /// Get a short description of the error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::UniqueConstraint => "Unique constraint violation",
            Self::ForeignKeyConstraint => "Foreign key constraint violation",
            Self::NotNullConstraint => "Not null constraint violation",
            Self::Deadlock => "Deadlock detected",
            Self::LockTimeout => "Lock wait timeout",
            Self::TransactionFailed => "Transaction failed",
            Self::SqlSyntax => "SQL syntax error",
            Self::UnknownObject => "Unknown table or column",
            Self::InvalidDataType => "Invalid data type",
            Self::DatabaseError => "Database error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A statement rejected by the database.
///
/// Carries the SQL text and the bound parameters for diagnosis. For batched
/// writes, `params` holds the parameter set of the failing row and
/// `batch_index` its position.
#[derive(Error, Debug)]
pub struct QueryError {
    /// The error code.
    pub code: ErrorCode,
    /// The driver's message.
    pub message: String,
    /// The failing statement.
    pub sql: String,
    /// The parameters bound to the failing statement.
    pub params: Vec<Value>,
    /// Position of the failing parameter set in a batch.
    pub batch_index: Option<usize>,
    /// The source error (if any).
    #[source]
    pub source: Option<BoxError>,
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] statement failed: {} | SQL: {}", self.code, self.message, self.sql)?;
        if !self.params.is_empty() {
            write!(f, " | params: [")?;
            for (i, p) in self.params.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", p)?;
            }
            write!(f, "]")?;
        }
        if let Some(index) = self.batch_index {
            write!(f, " | batch row: {}", index)?;
        }
        Ok(())
    }
}

impl QueryError {
    /// Create a new query error.
    pub fn new(
        code: ErrorCode,
        message: impl Into<String>,
        sql: impl Into<String>,
        params: &[Value],
    ) -> Self {
        Self {
            code,
            message: message.into(),
            sql: sql.into(),
            params: params.to_vec(),
            batch_index: None,
            source: None,
        }
    }

    /// Record which row of a batch failed.
    pub fn with_batch_index(mut self, index: usize) -> Self {
        self.batch_index = Some(index);
        self
    }

    /// Set the source error.
    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Check if this is a constraint violation.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::UniqueConstraint
                | ErrorCode::ForeignKeyConstraint
                | ErrorCode::NotNullConstraint
        )
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self.code, ErrorCode::Deadlock | ErrorCode::LockTimeout)
    }
}

/// Category of a [`ValidationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationErrorKind {
    /// Update or delete without a filter.
    EmptyFilter,
    /// Table or column name failed the identifier allow-list.
    InvalidIdentifier,
    /// Rows of a batch insert do not share one column set.
    MismatchedColumns,
    /// Operator not recognized, or wrong operand count.
    InvalidOperator,
    /// `IN` / `NOT IN` with no values, or an empty `OR`/`AND` group.
    EmptyValues,
    /// Insert or update with no columns.
    EmptyRow,
    /// A value could not be converted to the requested type.
    TypeMismatch,
    /// A row has no column with the requested name.
    MissingColumn,
    /// Malformed shorthand filter input.
    MalformedFilter,
}

/// Caller misuse, raised before any database call.
#[derive(Error, Debug, Clone)]
#[error("validation error: {message}")]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable message.
    pub message: String,
}

/// Helper for creating validation errors.
#[macro_export]
macro_rules! validation_error {
    ($kind:ident, $($arg:tt)+) => {
        $crate::error::DbError::validation(
            $crate::error::ValidationErrorKind::$kind,
            format!($($arg)+),
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_format() {
        assert_eq!(ErrorCode::UniqueConstraint.code(), "Q2001");
        assert_eq!(ErrorCode::Deadlock.code(), "Q4002");
        assert_eq!(ErrorCode::DatabaseError.to_string(), "Q5005");
    }

    #[test]
    fn test_query_error_display_carries_sql_and_params() {
        let err = QueryError::new(
            ErrorCode::UniqueConstraint,
            "Duplicate entry 'A' for key 'PRIMARY'",
            "INSERT INTO `price` (`code`) VALUES (?)",
            &[Value::from("A")],
        );
        let display = err.to_string();
        assert!(display.contains("Q2001"));
        assert!(display.contains("INSERT INTO `price`"));
        assert!(display.contains("\"A\""));
        assert!(err.is_constraint_violation());
    }

    #[test]
    fn test_batch_index_display() {
        let err = QueryError::new(ErrorCode::DatabaseError, "boom", "INSERT", &[])
            .with_batch_index(3);
        assert!(err.to_string().contains("batch row: 3"));
    }

    #[test]
    fn test_variants_are_distinguishable() {
        let config = DbError::configuration("max_connections must be > 0");
        let conn = DbError::connection(ConnectionErrorKind::Timeout, "waited 30s");
        let query: DbError = QueryError::new(ErrorCode::SqlSyntax, "bad", "SELEC 1", &[]).into();
        let validation = validation_error!(EmptyFilter, "refusing UPDATE on {}", "price");

        assert!(config.is_configuration());
        assert!(conn.is_connection() && conn.is_timeout());
        assert!(query.is_query());
        assert_eq!(query.sql(), Some("SELEC 1"));
        assert_eq!(validation.validation_kind(), Some(ValidationErrorKind::EmptyFilter));
        assert!(validation.to_string().contains("price"));
    }

    #[test]
    fn test_retryable_errors() {
        assert!(DbError::connection(ConnectionErrorKind::Timeout, "t").is_retryable());
        assert!(DbError::connection(ConnectionErrorKind::Network, "n").is_retryable());
        assert!(!DbError::connection(ConnectionErrorKind::Authentication, "a").is_retryable());
        let deadlock: DbError = QueryError::new(ErrorCode::Deadlock, "d", "UPDATE", &[]).into();
        assert!(deadlock.is_retryable());
        assert!(!DbError::configuration("c").is_retryable());
    }
}
