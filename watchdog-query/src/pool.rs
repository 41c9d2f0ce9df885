//! Lazily-initialized, bounded connection pool.
//!
//! The pool builds its internal state on the first [`ConnectionPool::acquire`]
//! from the current [`ConfigStore`] snapshot, pre-warming `min_cached`
//! sessions. Checked-out sessions are wrapped in a [`PooledConnection`] that
//! returns them on drop, on every exit path including errors and future
//! cancellation.
//!
//! At most `max_connections` sessions are checked out at once; a semaphore
//! permit travels with each [`PooledConnection`]. When all permits are taken,
//! `acquire` waits up to `wait_timeout` and then fails with a
//! [`ConnectionErrorKind::Timeout`] error.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use crate::config::{ConfigStore, ConnectionParameters, PoolParameters};
use crate::error::{ConnectionErrorKind, DbError, DbResult};
use crate::row::RowData;
use crate::session::{Connector, ExecOutcome, Session};
use crate::sql::Dialect;
use crate::value::Value;

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// Point-in-time pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Whether the pool state has been built.
    pub initialized: bool,
    /// Live sessions, idle plus checked out.
    pub open: usize,
    /// Sessions waiting for reuse.
    pub idle: usize,
    /// Sessions checked out.
    pub in_use: usize,
    /// Maximum sessions checked out at once.
    pub max: usize,
}

struct PoolState {
    generation: u64,
    connection: ConnectionParameters,
    params: PoolParameters,
    connector: Arc<dyn Connector>,
    semaphore: Arc<Semaphore>,
    idle: Mutex<VecDeque<Box<dyn Session>>>,
    open: AtomicUsize,
    in_use: AtomicUsize,
    retired: AtomicBool,
    stale_warned: AtomicBool,
}

impl PoolState {
    async fn open_session(&self) -> DbResult<Box<dyn Session>> {
        let session = self.connector.connect(&self.connection).await?;
        let open = self.open.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(open, "opened database session");
        Ok(session)
    }

    async fn take_idle(&self) -> Option<Box<dyn Session>> {
        loop {
            let mut session = self.idle.lock().pop_front()?;
            if session.is_broken() || (self.params.ping_on_checkout && !session.ping().await) {
                self.open.fetch_sub(1, Ordering::AcqRel);
                warn!("discarding dead idle session");
                session.close().await;
                continue;
            }
            return Some(session);
        }
    }

    fn release(&self, session: Box<dyn Session>, in_transaction: bool) {
        self.in_use.fetch_sub(1, Ordering::AcqRel);

        let reason = if in_transaction {
            Some("dropped inside a transaction")
        } else if session.is_broken() {
            Some("broken")
        } else if self.retired.load(Ordering::Acquire) {
            Some("pool was reset")
        } else {
            let mut idle = self.idle.lock();
            if idle.len() < self.params.max_cached {
                idle.push_back(session);
                return;
            }
            None
        };

        self.open.fetch_sub(1, Ordering::AcqRel);
        match reason {
            Some(reason) => warn!(reason, "discarding session instead of pooling it"),
            None => debug!("idle set full, closing session"),
        }
    }

    fn status(&self) -> PoolStatus {
        let idle = self.idle.lock().len();
        PoolStatus {
            initialized: true,
            open: self.open.load(Ordering::Acquire),
            idle,
            in_use: self.in_use.load(Ordering::Acquire),
            max: self.params.max_connections,
        }
    }
}

/// A bounded pool of database sessions.
pub struct ConnectionPool {
    id: u64,
    store: Arc<ConfigStore>,
    connector: Arc<dyn Connector>,
    current: Mutex<Option<Arc<PoolState>>>,
    init_lock: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("id", &self.id)
            .field("status", &self.status())
            .finish()
    }
}

impl ConnectionPool {
    /// Create a pool reading its settings from `store`.
    ///
    /// No connection is opened until the first [`acquire`](Self::acquire).
    pub fn new<C: Connector>(store: Arc<ConfigStore>, connector: C) -> Self {
        Self::with_connector(store, Arc::new(connector))
    }

    /// Create a pool from a shared connector.
    pub fn with_connector(store: Arc<ConfigStore>, connector: Arc<dyn Connector>) -> Self {
        Self {
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            store,
            connector,
            current: Mutex::new(None),
            init_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Process-unique pool id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The configuration store the pool reads from.
    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    /// Dialect of the underlying driver.
    pub fn dialect(&self) -> Dialect {
        self.connector.dialect()
    }

    async fn state(&self) -> DbResult<Arc<PoolState>> {
        if let Some(state) = self.current.lock().clone() {
            return Ok(state);
        }

        let _guard = self.init_lock.lock().await;
        if let Some(state) = self.current.lock().clone() {
            return Ok(state);
        }

        let snapshot = self.store.snapshot();
        snapshot.connection.validate()?;
        snapshot.pool.validate()?;

        let state = Arc::new(PoolState {
            generation: snapshot.generation,
            semaphore: Arc::new(Semaphore::new(snapshot.pool.max_connections)),
            idle: Mutex::new(VecDeque::with_capacity(snapshot.pool.max_cached)),
            connection: snapshot.connection,
            params: snapshot.pool,
            connector: Arc::clone(&self.connector),
            open: AtomicUsize::new(0),
            in_use: AtomicUsize::new(0),
            retired: AtomicBool::new(false),
            stale_warned: AtomicBool::new(false),
        });

        let mut warm = Vec::with_capacity(state.params.min_cached);
        for _ in 0..state.params.min_cached {
            match state.open_session().await {
                Ok(session) => warm.push(session),
                Err(e) => {
                    for mut session in warm {
                        session.close().await;
                    }
                    return Err(e);
                }
            }
        }
        state.idle.lock().extend(warm);

        info!(
            server = %state.connection,
            max_connections = state.params.max_connections,
            min_cached = state.params.min_cached,
            max_cached = state.params.max_cached,
            "connection pool created"
        );

        *self.current.lock() = Some(Arc::clone(&state));
        Ok(state)
    }

    /// Check out a session.
    ///
    /// Reuses an idle session when one is available (pinging it first when
    /// `ping_on_checkout` is set), otherwise opens a new one.
    pub async fn acquire(&self) -> DbResult<PooledConnection> {
        let state = self.state().await?;

        if state.generation != self.store.generation()
            && !state.stale_warned.swap(true, Ordering::AcqRel)
        {
            warn!(
                pool_generation = state.generation,
                config_generation = self.store.generation(),
                "configuration changed since the pool was created; call reset_pool to apply it"
            );
        }

        let wait = state.params.wait_timeout;
        let permit = match tokio::time::timeout(wait, Arc::clone(&state.semaphore).acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => {
                return Err(DbError::connection(
                    ConnectionErrorKind::Closed,
                    "connection pool is closed",
                ));
            }
            Err(_) => {
                return Err(DbError::connection(
                    ConnectionErrorKind::Timeout,
                    format!(
                        "no connection available within {:?} ({} checked out)",
                        wait,
                        state.in_use.load(Ordering::Acquire)
                    ),
                ));
            }
        };

        let session = match state.take_idle().await {
            Some(session) => session,
            None => state.open_session().await?,
        };
        state.in_use.fetch_add(1, Ordering::AcqRel);

        Ok(PooledConnection {
            session: Some(session),
            state,
            pool_id: self.id,
            in_transaction: false,
            _permit: permit,
        })
    }

    /// Close every idle session and force re-creation from the latest
    /// configuration on the next acquire.
    ///
    /// Sessions checked out at the time are discarded when returned.
    pub async fn reset_pool(&self) {
        let _guard = self.init_lock.lock().await;
        let Some(state) = self.current.lock().take() else {
            return;
        };
        state.retired.store(true, Ordering::Release);
        state.semaphore.close();

        let drained: Vec<_> = state.idle.lock().drain(..).collect();
        let closed = drained.len();
        for mut session in drained {
            session.close().await;
        }
        state.open.fetch_sub(closed, Ordering::AcqRel);
        info!(closed, "connection pool reset");
    }

    /// Current counters. Never opens a connection.
    pub fn status(&self) -> PoolStatus {
        match self.current.lock().as_ref() {
            Some(state) => state.status(),
            None => PoolStatus {
                initialized: false,
                open: 0,
                idle: 0,
                in_use: 0,
                max: self.store.get_config().1.max_connections,
            },
        }
    }

    /// Whether the configuration changed after the pool state was built.
    pub fn is_stale(&self) -> bool {
        match self.current.lock().as_ref() {
            Some(state) => state.generation != self.store.generation(),
            None => false,
        }
    }
}

/// A session checked out of a [`ConnectionPool`].
///
/// Returned to the pool on drop. A session that broke, was dropped while a
/// transaction was open, or outlived a [`ConnectionPool::reset_pool`] is
/// closed instead.
pub struct PooledConnection {
    session: Option<Box<dyn Session>>,
    state: Arc<PoolState>,
    pool_id: u64,
    in_transaction: bool,
    _permit: OwnedSemaphorePermit,
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("pool_id", &self.pool_id)
            .field("in_transaction", &self.in_transaction)
            .finish()
    }
}

impl PooledConnection {
    fn session(&mut self) -> DbResult<&mut Box<dyn Session>> {
        self.session.as_mut().ok_or_else(|| {
            DbError::connection(ConnectionErrorKind::Closed, "session already released")
        })
    }

    /// Id of the pool this connection came from.
    pub fn pool_id(&self) -> u64 {
        self.pool_id
    }

    /// Whether a transaction is open on this connection.
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Run a statement and collect every row.
    pub async fn query(&mut self, sql: &str, params: &[Value]) -> DbResult<Vec<RowData>> {
        self.session()?.query(sql, params).await
    }

    /// Run a write statement.
    pub async fn exec(&mut self, sql: &str, params: &[Value]) -> DbResult<ExecOutcome> {
        self.session()?.exec(sql, params).await
    }

    /// Run a prepared statement once per parameter set.
    pub async fn exec_batch(&mut self, sql: &str, batches: &[Vec<Value>]) -> DbResult<u64> {
        self.session()?.exec_batch(sql, batches).await
    }

    /// Start a transaction.
    pub async fn begin(&mut self) -> DbResult<()> {
        self.session()?.begin().await?;
        self.in_transaction = true;
        Ok(())
    }

    /// Commit. On failure the connection stays marked as mid-transaction
    /// and is discarded on drop.
    pub async fn commit(&mut self) -> DbResult<()> {
        self.session()?.commit().await?;
        self.in_transaction = false;
        Ok(())
    }

    /// Roll back.
    pub async fn rollback(&mut self) -> DbResult<()> {
        self.session()?.rollback().await?;
        self.in_transaction = false;
        Ok(())
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            self.state.release(session, self.in_transaction);
        }
    }
}
