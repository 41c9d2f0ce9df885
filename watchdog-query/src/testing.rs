//! Scripted in-memory driver for unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::config::ConnectionParameters;
use crate::error::{ConnectionErrorKind, DbError, DbResult, ErrorCode, QueryError};
use crate::row::RowData;
use crate::session::{Connector, ExecOutcome, Session};
use crate::sql::Dialect;
use crate::value::Value;

#[derive(Default)]
struct MockState {
    log: Vec<(usize, String, Vec<Value>)>,
    opened: usize,
    closed: usize,
    fail_connect: bool,
    ping_fails: bool,
    fail_on: Option<String>,
    fail_batch_at: Option<usize>,
    rows: Vec<RowData>,
    last_database: Option<String>,
    next_insert_id: u64,
}

#[derive(Clone)]
pub(crate) struct MockConnector {
    state: Arc<Mutex<MockState>>,
    broken: Arc<AtomicBool>,
    dialect: Dialect,
}

impl MockConnector {
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            broken: Arc::new(AtomicBool::new(false)),
            dialect: Dialect::MySql,
        }
    }

    pub(crate) fn opened(&self) -> usize {
        self.state.lock().opened
    }

    pub(crate) fn closed(&self) -> usize {
        self.state.lock().closed
    }

    pub(crate) fn break_all(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }

    pub(crate) fn set_ping(&self, ok: bool) {
        self.state.lock().ping_fails = !ok;
    }

    pub(crate) fn fail_connect(&self, fail: bool) {
        self.state.lock().fail_connect = fail;
    }

    pub(crate) fn fail_on(&self, fragment: &str) {
        self.state.lock().fail_on = Some(fragment.to_string());
    }

    pub(crate) fn fail_batch_at(&self, index: usize) {
        self.state.lock().fail_batch_at = Some(index);
    }

    pub(crate) fn set_rows(&self, rows: Vec<RowData>) {
        self.state.lock().rows = rows;
    }

    pub(crate) fn last_database(&self) -> Option<String> {
        self.state.lock().last_database.clone()
    }

    /// Every statement run, in order, including BEGIN/COMMIT/ROLLBACK.
    pub(crate) fn statements(&self) -> Vec<String> {
        self.state.lock().log.iter().map(|(_, sql, _)| sql.clone()).collect()
    }

    /// `(session id, sql)` for every statement run.
    pub(crate) fn statement_sessions(&self) -> Vec<(usize, String)> {
        self.state
            .lock()
            .log
            .iter()
            .map(|(id, sql, _)| (*id, sql.clone()))
            .collect()
    }

    /// Parameters bound to the last statement.
    pub(crate) fn last_params(&self) -> Vec<Value> {
        self.state
            .lock()
            .log
            .last()
            .map(|(_, _, p)| p.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, params: &ConnectionParameters) -> DbResult<Box<dyn Session>> {
        let mut state = self.state.lock();
        if state.fail_connect {
            return Err(DbError::connection(
                ConnectionErrorKind::Network,
                "mock connection refused",
            ));
        }
        state.opened += 1;
        state.last_database = Some(params.database.clone());
        Ok(Box::new(MockSession {
            id: state.opened,
            state: Arc::clone(&self.state),
            broken: Arc::clone(&self.broken),
        }))
    }

    fn dialect(&self) -> Dialect {
        self.dialect
    }
}

struct MockSession {
    id: usize,
    state: Arc<Mutex<MockState>>,
    broken: Arc<AtomicBool>,
}

impl MockSession {
    fn record(&self, sql: &str, params: &[Value]) -> DbResult<()> {
        let mut state = self.state.lock();
        state.log.push((self.id, sql.to_string(), params.to_vec()));
        match &state.fail_on {
            Some(fragment) if sql.contains(fragment.as_str()) => Err(QueryError::new(
                ErrorCode::DatabaseError,
                "mock failure",
                sql,
                params,
            )
            .into()),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Session for MockSession {
    async fn query(&mut self, sql: &str, params: &[Value]) -> DbResult<Vec<RowData>> {
        self.record(sql, params)?;
        Ok(self.state.lock().rows.clone())
    }

    async fn exec(&mut self, sql: &str, params: &[Value]) -> DbResult<ExecOutcome> {
        self.record(sql, params)?;
        let mut state = self.state.lock();
        state.next_insert_id += 1;
        Ok(ExecOutcome {
            affected_rows: 1,
            last_insert_id: Some(state.next_insert_id),
        })
    }

    async fn exec_batch(&mut self, sql: &str, batches: &[Vec<Value>]) -> DbResult<u64> {
        let fail_at = self.state.lock().fail_batch_at;
        for (index, params) in batches.iter().enumerate() {
            self.record(sql, params)?;
            if fail_at == Some(index) {
                return Err(QueryError::new(ErrorCode::UniqueConstraint, "duplicate", sql, params)
                    .with_batch_index(index)
                    .into());
            }
        }
        Ok(batches.len() as u64)
    }

    async fn begin(&mut self) -> DbResult<()> {
        self.record("BEGIN", &[])
    }

    async fn commit(&mut self) -> DbResult<()> {
        self.record("COMMIT", &[])
    }

    async fn rollback(&mut self) -> DbResult<()> {
        self.record("ROLLBACK", &[])
    }

    async fn ping(&mut self) -> bool {
        !self.state.lock().ping_fails
    }

    fn is_broken(&self) -> bool {
        self.broken.load(Ordering::SeqCst)
    }

    async fn close(&mut self) {
        self.state.lock().closed += 1;
    }
}
