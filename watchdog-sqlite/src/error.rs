//! Mapping of SQLite errors onto [`DbError`].

use rusqlite::ffi;

use watchdog_query::{ConnectionError, ConnectionErrorKind, DbError, ErrorCode, QueryError, Value};

/// Classify a `rusqlite` error.
pub fn error_code(err: &rusqlite::Error) -> ErrorCode {
    match err {
        rusqlite::Error::SqliteFailure(failure, message) => {
            match failure.extended_code {
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    return ErrorCode::UniqueConstraint;
                }
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => return ErrorCode::ForeignKeyConstraint,
                ffi::SQLITE_CONSTRAINT_NOTNULL => return ErrorCode::NotNullConstraint,
                _ => {}
            }
            match failure.code {
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked => {
                    ErrorCode::LockTimeout
                }
                rusqlite::ErrorCode::TypeMismatch => ErrorCode::InvalidDataType,
                _ => classify_message(message.as_deref().unwrap_or_default()),
            }
        }
        rusqlite::Error::InvalidColumnType(..) | rusqlite::Error::IntegralValueOutOfRange(..) => {
            ErrorCode::InvalidDataType
        }
        rusqlite::Error::InvalidColumnName(_) => ErrorCode::UnknownObject,
        _ => ErrorCode::DatabaseError,
    }
}

fn classify_message(message: &str) -> ErrorCode {
    if message.contains("syntax error") {
        ErrorCode::SqlSyntax
    } else if message.starts_with("no such table") || message.starts_with("no such column") {
        ErrorCode::UnknownObject
    } else {
        ErrorCode::DatabaseError
    }
}

/// Whether the session must be discarded after `err`.
pub fn breaks_connection(err: &tokio_rusqlite::Error) -> bool {
    matches!(
        err,
        tokio_rusqlite::Error::ConnectionClosed | tokio_rusqlite::Error::Close(_)
    )
}

/// Error raised while opening a database file.
pub fn connect_error(err: tokio_rusqlite::Error) -> DbError {
    ConnectionError::new(ConnectionErrorKind::Network, err.to_string())
        .with_source(err)
        .into()
}

/// Error raised by a statement.
pub fn query_error(err: tokio_rusqlite::Error, sql: &str, params: &[Value]) -> DbError {
    match err {
        tokio_rusqlite::Error::Rusqlite(e) => statement_error(e, sql, params),
        tokio_rusqlite::Error::ConnectionClosed | tokio_rusqlite::Error::Close(_) => {
            ConnectionError::new(ConnectionErrorKind::Closed, err.to_string())
                .with_source(err)
                .into()
        }
        other => QueryError::new(ErrorCode::DatabaseError, other.to_string(), sql, params)
            .with_source(other)
            .into(),
    }
}

/// Error raised by a statement inside a driver call.
pub fn statement_error(err: rusqlite::Error, sql: &str, params: &[Value]) -> DbError {
    QueryError::new(error_code(&err), err.to_string(), sql, params)
        .with_source(err)
        .into()
}
