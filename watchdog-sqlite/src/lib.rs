//! SQLite driver for the watchdog database layer.
//!
//! Opens file-backed databases through `tokio_rusqlite`, so blocking SQLite
//! calls run off the async executor. Used for local runs and for tests that
//! need a real database without a server.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use watchdog_query::{ConfigStore, ConnectionPool, RecordAccess};
//! use watchdog_sqlite::SqliteConnector;
//!
//! let store = Arc::new(ConfigStore::default());
//! let pool = ConnectionPool::new(store, SqliteConnector::new("watchdog.db"));
//! let dao = RecordAccess::from_pool(Arc::new(pool));
//! ```

pub mod connection;
pub mod error;
pub mod types;

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio_rusqlite::Connection;
use tracing::debug;

use watchdog_query::{ConnectionParameters, Connector, DbResult, Dialect, Session};

pub use connection::SqliteSession;

/// Default time a statement waits on a locked database.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens [`SqliteSession`]s on one database file.
///
/// The host, user and database name of [`ConnectionParameters`] do not apply
/// to SQLite and are ignored.
#[derive(Debug, Clone)]
pub struct SqliteConnector {
    path: PathBuf,
    busy_timeout: Duration,
    foreign_keys: bool,
}

impl SqliteConnector {
    /// Create a connector for the database file at `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            foreign_keys: true,
        }
    }

    /// Set how long statements wait on a locked database.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Enable or disable foreign key enforcement.
    pub fn foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    /// The database file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Connector for SqliteConnector {
    async fn connect(&self, _params: &ConnectionParameters) -> DbResult<Box<dyn Session>> {
        let conn = Connection::open(&self.path)
            .await
            .map_err(error::connect_error)?;

        let busy_timeout = self.busy_timeout;
        let foreign_keys = self.foreign_keys;
        conn.call(move |conn| {
            conn.busy_timeout(busy_timeout)?;
            conn.pragma_update(None, "foreign_keys", foreign_keys)?;
            let _mode: String =
                conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
            Ok(())
        })
        .await
        .map_err(error::connect_error)?;

        debug!(path = %self.path.display(), "sqlite connection opened");
        Ok(Box::new(SqliteSession::new(conn)))
    }

    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }
}
