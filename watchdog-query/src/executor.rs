//! Statement execution against pooled connections.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};
use crate::pool::ConnectionPool;
use crate::row::RowData;
use crate::session::ExecOutcome;
use crate::sql::Dialect;
use crate::transaction::{Transaction, current_transaction};
use crate::value::Value;

/// Runs parameterized SQL.
///
/// Implemented by the pool-backed [`StatementExecutor`] and by
/// [`Transaction`], so code written against `Executor` works the same
/// inside and outside a transaction.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Placeholder and quoting syntax of the target database.
    fn dialect(&self) -> Dialect;

    /// Run a query and collect every row.
    async fn fetch_all(&self, sql: &str, params: &[Value]) -> DbResult<Vec<RowData>>;

    /// Run a query and return its first row. Zero rows is `Ok(None)`.
    async fn fetch_one(&self, sql: &str, params: &[Value]) -> DbResult<Option<RowData>> {
        Ok(self.fetch_all(sql, params).await?.into_iter().next())
    }

    /// Run a write statement and return the affected row count.
    async fn execute(&self, sql: &str, params: &[Value]) -> DbResult<u64> {
        Ok(self.execute_insert(sql, params).await?.affected_rows)
    }

    /// Run a write statement and return the affected rows and generated id.
    async fn execute_insert(&self, sql: &str, params: &[Value]) -> DbResult<ExecOutcome>;

    /// Run one statement once per parameter set, atomically.
    ///
    /// Returns the summed affected rows. If any set fails, nothing is
    /// committed.
    async fn execute_many(&self, sql: &str, batches: &[Vec<Value>]) -> DbResult<u64>;
}

/// Pool-backed [`Executor`].
///
/// Each call checks out a connection for its duration. Calls made from a
/// task running inside [`StatementExecutor::transaction`] on the same pool
/// use the transaction's connection instead.
#[derive(Debug, Clone)]
pub struct StatementExecutor {
    pool: Arc<ConnectionPool>,
}

impl StatementExecutor {
    /// Create an executor over `pool`.
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    fn bound(&self) -> Option<Transaction> {
        current_transaction().filter(|tx| tx.pool_id() == self.pool.id())
    }

    /// Run `work` in a transaction.
    ///
    /// Commits when `work` returns `Ok`, rolls back and returns the error
    /// when it returns `Err`. The connection is released in every case, and
    /// discarded if the future is dropped mid-transaction. Called from
    /// inside another transaction on the same pool, `work` joins it.
    pub async fn transaction<F, Fut, T, E>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(Transaction) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<DbError>,
    {
        match self.bound() {
            Some(tx) => tx.transaction(work).await,
            None => Transaction::run(&self.pool, work).await,
        }
    }
}

#[async_trait]
impl Executor for StatementExecutor {
    fn dialect(&self) -> Dialect {
        self.pool.dialect()
    }

    async fn fetch_all(&self, sql: &str, params: &[Value]) -> DbResult<Vec<RowData>> {
        if let Some(tx) = self.bound() {
            return tx.fetch_all(sql, params).await;
        }
        debug!(sql, params = params.len(), "fetch_all");
        let mut conn = self.pool.acquire().await?;
        conn.query(sql, params).await
    }

    async fn execute_insert(&self, sql: &str, params: &[Value]) -> DbResult<ExecOutcome> {
        if let Some(tx) = self.bound() {
            return tx.execute_insert(sql, params).await;
        }
        debug!(sql, params = params.len(), "execute");
        let mut conn = self.pool.acquire().await?;
        conn.exec(sql, params).await
    }

    async fn execute_many(&self, sql: &str, batches: &[Vec<Value>]) -> DbResult<u64> {
        if batches.is_empty() {
            return Ok(0);
        }
        if let Some(tx) = self.bound() {
            return tx.execute_many(sql, batches).await;
        }
        debug!(sql, batches = batches.len(), "execute_many");
        let mut conn = self.pool.acquire().await?;
        conn.begin().await?;
        match conn.exec_batch(sql, batches).await {
            Ok(affected) => {
                conn.commit().await?;
                Ok(affected)
            }
            Err(err) => {
                if let Err(rollback) = conn.rollback().await {
                    warn!(error = %rollback, "rollback after failed batch failed");
                }
                Err(err)
            }
        }
    }
}
