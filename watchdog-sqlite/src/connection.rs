//! SQLite session over a `tokio_rusqlite` connection.

use async_trait::async_trait;
use rusqlite::params_from_iter;
use tokio_rusqlite::Connection;
use tracing::debug;

use watchdog_query::{
    ConnectionErrorKind, DbError, DbResult, ExecOutcome, RowData, Session, Value,
};

use crate::error::{breaks_connection, query_error, statement_error};
use crate::types::{read_row, to_params};

/// One open SQLite connection.
pub struct SqliteSession {
    conn: Option<Connection>,
    broken: bool,
}

impl SqliteSession {
    /// Wrap an open connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Some(conn),
            broken: false,
        }
    }

    fn conn(&self) -> DbResult<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| DbError::connection(ConnectionErrorKind::Closed, "session is closed"))
    }

    fn fail(&mut self, err: tokio_rusqlite::Error, sql: &str, params: &[Value]) -> DbError {
        if breaks_connection(&err) {
            self.broken = true;
        }
        query_error(err, sql, params)
    }

    async fn run_control(&mut self, sql: &'static str) -> DbResult<()> {
        debug!(sql, "control statement");
        let result = self
            .conn()?
            .call(move |conn| Ok(conn.execute_batch(sql)?))
            .await;
        result.map_err(|e| self.fail(e, sql, &[]))
    }
}

impl std::fmt::Debug for SqliteSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteSession")
            .field("open", &self.conn.is_some())
            .field("broken", &self.broken)
            .finish()
    }
}

fn is_insert(sql: &str) -> bool {
    sql.trim_start()
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("INSERT"))
}

#[async_trait]
impl Session for SqliteSession {
    async fn query(&mut self, sql: &str, params: &[Value]) -> DbResult<Vec<RowData>> {
        let bound = to_params(params)?;
        let owned = sql.to_string();
        let result = self
            .conn()?
            .call(move |conn| {
                let mut stmt = conn.prepare(&owned)?;
                let columns: Vec<String> =
                    stmt.column_names().iter().map(|s| s.to_string()).collect();
                let rows = stmt.query_map(params_from_iter(bound.iter()), |row| {
                    read_row(row, &columns)
                })?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await;
        result.map_err(|e| self.fail(e, sql, params))
    }

    async fn exec(&mut self, sql: &str, params: &[Value]) -> DbResult<ExecOutcome> {
        let bound = to_params(params)?;
        let owned = sql.to_string();
        let insert = is_insert(sql);
        let result = self
            .conn()?
            .call(move |conn| {
                let affected = conn.execute(&owned, params_from_iter(bound.iter()))?;
                let rowid = conn.last_insert_rowid();
                Ok((affected, rowid))
            })
            .await;
        match result {
            Ok((affected, rowid)) => Ok(ExecOutcome {
                affected_rows: affected as u64,
                last_insert_id: (insert && affected > 0 && rowid > 0).then_some(rowid as u64),
            }),
            Err(e) => Err(self.fail(e, sql, params)),
        }
    }

    async fn exec_batch(&mut self, sql: &str, batches: &[Vec<Value>]) -> DbResult<u64> {
        let bound = batches
            .iter()
            .map(|params| to_params(params))
            .collect::<DbResult<Vec<_>>>()?;
        let owned = sql.to_string();
        let result = self
            .conn()?
            .call(move |conn| {
                let mut stmt = conn.prepare_cached(&owned)?;
                let mut affected = 0u64;
                for (index, params) in bound.iter().enumerate() {
                    match stmt.execute(params_from_iter(params.iter())) {
                        Ok(n) => affected += n as u64,
                        Err(e) => return Ok(Err((index, e))),
                    }
                }
                Ok(Ok(affected))
            })
            .await;
        match result {
            Ok(Ok(affected)) => Ok(affected),
            Ok(Err((index, e))) => Err(match statement_error(e, sql, &batches[index]) {
                DbError::Query(q) => q.with_batch_index(index).into(),
                other => other,
            }),
            Err(e) => Err(self.fail(e, sql, &[])),
        }
    }

    async fn begin(&mut self) -> DbResult<()> {
        self.run_control("BEGIN").await
    }

    async fn commit(&mut self) -> DbResult<()> {
        self.run_control("COMMIT").await
    }

    async fn rollback(&mut self) -> DbResult<()> {
        self.run_control("ROLLBACK").await
    }

    async fn ping(&mut self) -> bool {
        let Some(conn) = self.conn.as_ref() else {
            return false;
        };
        let result = conn
            .call(|conn| Ok(conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?))
            .await;
        match result {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "ping failed");
                self.broken = true;
                false
            }
        }
    }

    fn is_broken(&self) -> bool {
        self.broken || self.conn.is_none()
    }

    async fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err(e) = conn.close().await {
                debug!(error = %e, "close failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_insert() {
        assert!(is_insert("INSERT INTO t VALUES (1)"));
        assert!(is_insert("  insert into t values (1)"));
        assert!(!is_insert("UPDATE t SET a = 1"));
        assert!(!is_insert("INS"));
    }
}
