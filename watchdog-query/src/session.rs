//! Driver seam.
//!
//! A driver crate implements [`Connector`] (opens sessions and reports its
//! [`Dialect`]) and [`Session`] (one live connection). Nothing above this
//! module knows which database it is talking to.

use async_trait::async_trait;

use crate::config::ConnectionParameters;
use crate::error::DbResult;
use crate::row::RowData;
use crate::sql::Dialect;
use crate::value::Value;

/// Result of a write statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecOutcome {
    /// Rows changed by the statement.
    pub affected_rows: u64,
    /// Auto-increment id generated by an insert, if any.
    pub last_insert_id: Option<u64>,
}

/// One live database connection.
///
/// Implementations mark themselves broken when the link fails, so the pool
/// can discard rather than reuse them.
#[async_trait]
pub trait Session: Send {
    /// Run a statement and collect every row.
    async fn query(&mut self, sql: &str, params: &[Value]) -> DbResult<Vec<RowData>>;

    /// Run a write statement.
    async fn exec(&mut self, sql: &str, params: &[Value]) -> DbResult<ExecOutcome>;

    /// Run one prepared statement once per parameter set, returning the
    /// summed affected rows. A failure reports the index of the failing set.
    async fn exec_batch(&mut self, sql: &str, batches: &[Vec<Value>]) -> DbResult<u64>;

    /// Start a transaction.
    async fn begin(&mut self) -> DbResult<()>;

    /// Commit the open transaction.
    async fn commit(&mut self) -> DbResult<()>;

    /// Roll back the open transaction.
    async fn rollback(&mut self) -> DbResult<()>;

    /// Check the connection is alive.
    async fn ping(&mut self) -> bool;

    /// Whether the connection failed and must not be reused.
    fn is_broken(&self) -> bool;

    /// Close the connection.
    async fn close(&mut self);
}

/// Opens sessions for a connection pool.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a new session.
    async fn connect(&self, params: &ConnectionParameters) -> DbResult<Box<dyn Session>>;

    /// Placeholder and quoting syntax of the sessions this connector opens.
    fn dialect(&self) -> Dialect;
}
