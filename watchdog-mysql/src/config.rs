//! Connection options for `mysql_async`.

use mysql_async::{Opts, OptsBuilder};

use watchdog_query::{ConnectionParameters, DbResult};

/// Statements run on every new connection.
pub fn init_statements(params: &ConnectionParameters) -> Vec<String> {
    vec![format!("SET NAMES {}", params.charset)]
}

/// Convert connection parameters to driver options.
///
/// Fails on parameters that [`ConnectionParameters::validate`] rejects, so
/// the charset interpolated into `SET NAMES` is always a bare identifier.
pub fn to_opts(params: &ConnectionParameters) -> DbResult<Opts> {
    params.validate()?;

    let password = if params.password.is_empty() {
        None
    } else {
        Some(params.password.clone())
    };

    let builder = OptsBuilder::default()
        .ip_or_hostname(params.host.clone())
        .tcp_port(params.port)
        .user(Some(params.user.clone()))
        .pass(password)
        .db_name(Some(params.database.clone()))
        .prefer_socket(false)
        .init(init_statements(params));

    Ok(builder.into())
}
