//! Transactions bound to one pooled connection.
//!
//! [`StatementExecutor::transaction`](crate::StatementExecutor::transaction)
//! checks out a connection, issues `BEGIN`, and hands a [`Transaction`] to the
//! caller's closure. The transaction commits when the closure returns `Ok`
//! and rolls back when it returns `Err`; the connection goes back to the
//! pool either way.
//!
//! While the closure runs, the transaction is also bound to the current
//! task. Any `StatementExecutor` call made from that task, including a
//! nested `transaction`, runs on the bound connection instead of acquiring a
//! new one, so helpers written against a plain executor join the
//! surrounding transaction. The binding does not cross `tokio::spawn`.
//!
//! ```rust,ignore
//! let executor = StatementExecutor::new(pool);
//! executor
//!     .transaction(|tx| async move {
//!         tx.execute("UPDATE account SET balance = balance - ? WHERE id = ?", &[10.into(), 1.into()]).await?;
//!         tx.execute("UPDATE account SET balance = balance + ? WHERE id = ?", &[10.into(), 2.into()]).await?;
//!         Ok::<_, DbError>(())
//!     })
//!     .await?;
//! ```

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::{ConnectionErrorKind, DbError, DbResult};
use crate::executor::Executor;
use crate::pool::{ConnectionPool, PooledConnection};
use crate::row::RowData;
use crate::session::ExecOutcome;
use crate::sql::Dialect;
use crate::value::Value;

tokio::task_local! {
    /// Transaction bound to the running task.
    static CURRENT_TX: Transaction;
}

static NEXT_TX_ID: AtomicU64 = AtomicU64::new(1);

struct TxInner {
    id: u64,
    pool_id: u64,
    dialect: Dialect,
    depth: AtomicUsize,
    conn: tokio::sync::Mutex<Option<PooledConnection>>,
}

/// An open transaction.
///
/// Cheap to clone; every clone drives the same connection. Statements from
/// concurrent clones are serialized.
#[derive(Clone)]
pub struct Transaction {
    inner: Arc<TxInner>,
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.inner.id)
            .field("pool_id", &self.inner.pool_id)
            .field("depth", &self.depth())
            .finish()
    }
}

fn finished() -> DbError {
    DbError::connection(ConnectionErrorKind::Closed, "transaction already finished")
}

struct DepthGuard<'a>(&'a AtomicUsize);

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl Transaction {
    fn new(conn: PooledConnection, dialect: Dialect) -> Self {
        Self {
            inner: Arc::new(TxInner {
                id: NEXT_TX_ID.fetch_add(1, Ordering::Relaxed),
                pool_id: conn.pool_id(),
                dialect,
                depth: AtomicUsize::new(0),
                conn: tokio::sync::Mutex::new(Some(conn)),
            }),
        }
    }

    /// Process-unique transaction id.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Id of the pool the connection belongs to.
    pub fn pool_id(&self) -> u64 {
        self.inner.pool_id
    }

    /// Nesting depth: 0 in the outermost scope.
    pub fn depth(&self) -> usize {
        self.inner.depth.load(Ordering::Acquire)
    }

    /// Whether commit or rollback already happened.
    pub async fn is_finished(&self) -> bool {
        self.inner.conn.lock().await.is_none()
    }

    /// Run `work` inside this transaction.
    ///
    /// Nested scopes share the connection. They neither commit nor roll
    /// back; the outermost scope decides for all of them.
    pub async fn transaction<F, Fut, T, E>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(Transaction) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.inner.depth.fetch_add(1, Ordering::AcqRel);
        let _depth = DepthGuard(&self.inner.depth);
        debug!(tx = self.inner.id, depth = self.depth(), "entering nested transaction scope");
        work(self.clone()).await
    }

    async fn finish(&self, commit: bool) -> DbResult<()> {
        let mut conn = self.inner.conn.lock().await.take().ok_or_else(finished)?;
        if commit {
            conn.commit().await
        } else {
            conn.rollback().await
        }
    }

    /// Run `work` in a new transaction on a connection from `pool`.
    pub(crate) async fn run<F, Fut, T, E>(pool: &ConnectionPool, work: F) -> Result<T, E>
    where
        F: FnOnce(Transaction) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<DbError>,
    {
        let mut conn = pool.acquire().await?;
        conn.begin().await?;
        let tx = Transaction::new(conn, pool.dialect());
        debug!(tx = tx.id(), "transaction started");

        match CURRENT_TX.scope(tx.clone(), work(tx.clone())).await {
            Ok(value) => {
                tx.finish(true).await?;
                info!(tx = tx.id(), "transaction committed");
                Ok(value)
            }
            Err(err) => {
                match tx.finish(false).await {
                    Ok(()) => warn!(tx = tx.id(), "transaction rolled back"),
                    Err(rollback) => {
                        warn!(tx = tx.id(), error = %rollback, "transaction rollback failed")
                    }
                }
                Err(err)
            }
        }
    }
}

/// The transaction bound to the running task, if any.
pub fn current_transaction() -> Option<Transaction> {
    CURRENT_TX.try_with(|tx| tx.clone()).ok()
}

#[async_trait]
impl Executor for Transaction {
    fn dialect(&self) -> Dialect {
        self.inner.dialect
    }

    async fn fetch_all(&self, sql: &str, params: &[Value]) -> DbResult<Vec<RowData>> {
        debug!(tx = self.inner.id, sql, params = params.len(), "fetch_all");
        let mut guard = self.inner.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(finished)?;
        conn.query(sql, params).await
    }

    async fn execute_insert(&self, sql: &str, params: &[Value]) -> DbResult<ExecOutcome> {
        debug!(tx = self.inner.id, sql, params = params.len(), "execute");
        let mut guard = self.inner.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(finished)?;
        conn.exec(sql, params).await
    }

    async fn execute_many(&self, sql: &str, batches: &[Vec<Value>]) -> DbResult<u64> {
        if batches.is_empty() {
            return Ok(0);
        }
        debug!(tx = self.inner.id, sql, batches = batches.len(), "execute_many");
        let mut guard = self.inner.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(finished)?;
        conn.exec_batch(sql, batches).await
    }
}
