//! MySQL session over a single `mysql_async` connection.

use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Conn, Row};
use tracing::debug;

use watchdog_query::{
    ConnectionErrorKind, DbError, DbResult, ExecOutcome, RowData, Session, Value,
};

use crate::error::{breaks_connection, query_error};
use crate::types::{row_from_mysql, to_params};

/// One live MySQL connection.
pub struct MysqlSession {
    conn: Option<Conn>,
    broken: bool,
}

impl MysqlSession {
    /// Wrap an established connection.
    pub fn new(conn: Conn) -> Self {
        Self {
            conn: Some(conn),
            broken: false,
        }
    }

    /// Server-side connection id.
    pub fn id(&self) -> Option<u32> {
        self.conn.as_ref().map(|c| c.id())
    }

    fn conn(&mut self) -> DbResult<&mut Conn> {
        self.conn
            .as_mut()
            .ok_or_else(|| DbError::connection(ConnectionErrorKind::Closed, "session is closed"))
    }

    fn fail(&mut self, err: mysql_async::Error, sql: &str, params: &[Value]) -> DbError {
        if breaks_connection(&err) {
            self.broken = true;
        }
        query_error(err, sql, params)
    }

    async fn run_control(&mut self, sql: &'static str) -> DbResult<()> {
        debug!(sql, "control statement");
        let result = self.conn()?.query_drop(sql).await;
        result.map_err(|e| self.fail(e, sql, &[]))
    }
}

impl std::fmt::Debug for MysqlSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MysqlSession")
            .field("id", &self.id())
            .field("broken", &self.broken)
            .finish()
    }
}

#[async_trait]
impl Session for MysqlSession {
    async fn query(&mut self, sql: &str, params: &[Value]) -> DbResult<Vec<RowData>> {
        let bound = to_params(params)?;
        let result: Result<Vec<Row>, _> = self.conn()?.exec(sql, bound).await;
        match result {
            Ok(rows) => Ok(rows.into_iter().map(row_from_mysql).collect()),
            Err(e) => Err(self.fail(e, sql, params)),
        }
    }

    async fn exec(&mut self, sql: &str, params: &[Value]) -> DbResult<ExecOutcome> {
        let bound = to_params(params)?;
        let conn = self.conn()?;
        match conn.exec_drop(sql, bound).await {
            Ok(()) => Ok(ExecOutcome {
                affected_rows: conn.affected_rows(),
                last_insert_id: conn.last_insert_id().filter(|id| *id != 0),
            }),
            Err(e) => Err(self.fail(e, sql, params)),
        }
    }

    async fn exec_batch(&mut self, sql: &str, batches: &[Vec<Value>]) -> DbResult<u64> {
        let prepared = self.conn()?.prep(sql).await;
        let statement = match prepared {
            Ok(statement) => statement,
            Err(e) => return Err(self.fail(e, sql, &[])),
        };

        // `Queryable::exec_batch` also sends one COM_STMT_EXECUTE per set, but
        // drops which set failed; `QueryError::batch_index` needs it.
        let mut affected = 0;
        for (index, params) in batches.iter().enumerate() {
            let bound = to_params(params)?;
            let conn = self.conn()?;
            match conn.exec_drop(statement.clone(), bound).await {
                Ok(()) => affected += conn.affected_rows(),
                Err(e) => {
                    return Err(match self.fail(e, sql, params) {
                        DbError::Query(q) => q.with_batch_index(index).into(),
                        other => other,
                    });
                }
            }
        }
        Ok(affected)
    }

    async fn begin(&mut self) -> DbResult<()> {
        self.run_control("START TRANSACTION").await
    }

    async fn commit(&mut self) -> DbResult<()> {
        self.run_control("COMMIT").await
    }

    async fn rollback(&mut self) -> DbResult<()> {
        self.run_control("ROLLBACK").await
    }

    async fn ping(&mut self) -> bool {
        let Some(conn) = self.conn.as_mut() else {
            return false;
        };
        match conn.ping().await {
            Ok(()) => true,
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
            if let Err(e) = conn.disconnect().await {
                debug!(error = %e, "disconnect failed");
            }
        }
    }
}
