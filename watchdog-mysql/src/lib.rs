//! MySQL driver for the watchdog database layer.
//!
//! Plugs `mysql_async` into [`watchdog_query`] through the [`Connector`] and
//! [`Session`] traits. Pooling, transactions and statement generation all
//! live in `watchdog-query`; this crate only opens connections, binds
//! values and classifies server errors.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use watchdog_mysql::MysqlConnector;
//! use watchdog_query::{ConfigStore, RecordAccess};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(ConfigStore::from_env()?);
//!     let dao = RecordAccess::from_pool(Arc::new(MysqlConnector::pool(store)));
//!
//!     let funds = dao.count_rows("fund", ()).await?;
//!     println!("{funds} funds");
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod types;

use std::sync::Arc;

use async_trait::async_trait;
use mysql_async::Conn;
use tracing::debug;

use watchdog_query::{
    ConfigStore, ConnectionErrorKind, ConnectionParameters, ConnectionPool, Connector, DbError,
    DbResult, Dialect, Session,
};

pub use connection::MysqlSession;

/// Opens [`MysqlSession`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlConnector;

impl MysqlConnector {
    /// Create a connector.
    pub fn new() -> Self {
        Self
    }

    /// A connection pool over MySQL, configured from `store`.
    pub fn pool(store: Arc<ConfigStore>) -> ConnectionPool {
        ConnectionPool::new(store, Self)
    }
}

#[async_trait]
impl Connector for MysqlConnector {
    async fn connect(&self, params: &ConnectionParameters) -> DbResult<Box<dyn Session>> {
        let opts = config::to_opts(params)?;
        let conn = match tokio::time::timeout(params.connect_timeout, Conn::new(opts)).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => return Err(error::connect_error(e)),
            Err(_) => {
                return Err(DbError::connection(
                    ConnectionErrorKind::Timeout,
                    format!(
                        "connecting to {} timed out after {:?}",
                        params, params.connect_timeout
                    ),
                ));
            }
        };
        debug!(server = %params, id = conn.id(), "mysql connection opened");
        Ok(Box::new(MysqlSession::new(conn)))
    }

    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }
}
