//! Mapping of `mysql_async` errors onto [`DbError`].

use watchdog_query::{ConnectionError, ConnectionErrorKind, DbError, ErrorCode, QueryError, Value};

/// Map a MySQL server error number to an [`ErrorCode`].
pub fn error_code(server_code: u16) -> ErrorCode {
    match server_code {
        1062 | 1586 => ErrorCode::UniqueConstraint,
        1216 | 1217 | 1451 | 1452 => ErrorCode::ForeignKeyConstraint,
        1048 | 1364 => ErrorCode::NotNullConstraint,
        1213 => ErrorCode::Deadlock,
        1205 => ErrorCode::LockTimeout,
        1064 | 1149 => ErrorCode::SqlSyntax,
        1049 | 1054 | 1146 => ErrorCode::UnknownObject,
        1264 | 1292 | 1366 | 1406 => ErrorCode::InvalidDataType,
        _ => ErrorCode::DatabaseError,
    }
}

/// Whether the connection that produced `err` must be discarded.
pub fn breaks_connection(err: &mysql_async::Error) -> bool {
    matches!(
        err,
        mysql_async::Error::Io(_) | mysql_async::Error::Driver(_)
    )
}

/// Error raised while establishing a connection.
pub fn connect_error(err: mysql_async::Error) -> DbError {
    let kind = match &err {
        mysql_async::Error::Server(server) if matches!(server.code, 1044 | 1045 | 1698) => {
            ConnectionErrorKind::Authentication
        }
        _ => ConnectionErrorKind::Network,
    };
    ConnectionError::new(kind, err.to_string())
        .with_source(err)
        .into()
}

/// Error raised by a statement.
///
/// Server errors become [`QueryError`]s carrying the statement and its
/// parameters; link failures become network [`ConnectionError`]s.
pub fn query_error(err: mysql_async::Error, sql: &str, params: &[Value]) -> DbError {
    match &err {
        mysql_async::Error::Server(server) => {
            let code = error_code(server.code);
            let message = format!("{} ({})", server.message, server.code);
            QueryError::new(code, message, sql, params)
                .with_source(err)
                .into()
        }
        mysql_async::Error::Io(_) | mysql_async::Error::Driver(_) => {
            ConnectionError::new(ConnectionErrorKind::Network, err.to_string())
                .with_source(err)
                .into()
        }
        _ => QueryError::new(ErrorCode::DatabaseError, err.to_string(), sql, params)
            .with_source(err)
            .into(),
    }
}
