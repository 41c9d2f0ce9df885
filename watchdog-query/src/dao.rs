//! Single-table record access.
//!
//! [`RecordAccess`] turns table names, rows and filters into statements and
//! runs them through an [`Executor`]. Writes that would touch every row of a
//! table are refused: `update_rows` and `delete_rows` fail with
//! [`ValidationErrorKind::EmptyFilter`](crate::ValidationErrorKind::EmptyFilter)
//! before any statement is sent.
//!
//! ```rust,ignore
//! let dao = RecordAccess::new(executor);
//!
//! dao.insert_row("price", &row! { "code" => "161725", "price" => 1.042 }).await?;
//!
//! let recent = dao
//!     .select_rows(
//!         "price",
//!         &["code", "date", "price"],
//!         filter! { "code" => "161725", "date" => (">=", "2024-01-01") },
//!         &SelectOptions::new().desc("date").limit(30),
//!     )
//!     .await?;
//! ```

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::error::DbResult;
use crate::executor::{Executor, StatementExecutor};
use crate::filter::IntoFilter;
use crate::pool::ConnectionPool;
use crate::row::RowData;
use crate::session::ExecOutcome;
use crate::sql::{self, SelectOptions};

/// Result of [`RecordAccess::insert_row`].
pub type InsertOutcome = ExecOutcome;

/// Select/insert/update/delete helpers over an [`Executor`].
#[derive(Debug, Clone)]
pub struct RecordAccess<E = StatementExecutor> {
    executor: E,
}

impl RecordAccess<StatementExecutor> {
    /// Record access backed by `pool`.
    pub fn from_pool(pool: Arc<ConnectionPool>) -> Self {
        Self::new(StatementExecutor::new(pool))
    }
}

impl<E: Executor> RecordAccess<E> {
    /// Wrap an executor.
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    /// The underlying executor.
    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Select rows. Empty `columns` selects every column.
    #[instrument(skip(self, columns, filter, options), fields(table = %table))]
    pub async fn select_rows(
        &self,
        table: &str,
        columns: &[&str],
        filter: impl IntoFilter,
        options: &SelectOptions,
    ) -> DbResult<Vec<RowData>> {
        let filter = filter.into_filter()?;
        let stmt = sql::select(self.executor.dialect(), table, columns, filter.as_ref(), options)?;
        debug!(sql = %stmt.sql, params = stmt.params.len(), "select_rows");
        self.executor.fetch_all(&stmt.sql, &stmt.params).await
    }

    /// Select at most one row.
    #[instrument(skip(self, columns, filter), fields(table = %table))]
    pub async fn select_one(
        &self,
        table: &str,
        columns: &[&str],
        filter: impl IntoFilter,
    ) -> DbResult<Option<RowData>> {
        let filter = filter.into_filter()?;
        let options = SelectOptions::new().limit(1);
        let stmt = sql::select(self.executor.dialect(), table, columns, filter.as_ref(), &options)?;
        debug!(sql = %stmt.sql, params = stmt.params.len(), "select_one");
        self.executor.fetch_one(&stmt.sql, &stmt.params).await
    }

    /// Insert one row.
    #[instrument(skip(self, row), fields(table = %table))]
    pub async fn insert_row(&self, table: &str, row: &RowData) -> DbResult<InsertOutcome> {
        let stmt = sql::insert(self.executor.dialect(), table, row)?;
        debug!(sql = %stmt.sql, params = stmt.params.len(), "insert_row");
        self.executor.execute_insert(&stmt.sql, &stmt.params).await
    }

    /// Insert many rows with one prepared statement, atomically.
    ///
    /// Every row must have the same columns. An empty slice returns 0
    /// without touching the database.
    #[instrument(skip(self, rows), fields(table = %table, rows = rows.len()))]
    pub async fn insert_many(&self, table: &str, rows: &[RowData]) -> DbResult<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let stmt = sql::insert_many(self.executor.dialect(), table, rows)?;
        debug!(sql = %stmt.sql, "insert_many");
        self.executor.execute_many(&stmt.sql, &stmt.batches).await
    }

    /// Insert many rows, updating existing ones that collide on
    /// `conflict_columns`.
    ///
    /// With empty `update_columns`, every inserted column outside
    /// `conflict_columns` is updated.
    #[instrument(skip(self, rows, conflict_columns, update_columns), fields(table = %table, rows = rows.len()))]
    pub async fn upsert_many(
        &self,
        table: &str,
        rows: &[RowData],
        conflict_columns: &[&str],
        update_columns: &[&str],
    ) -> DbResult<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let stmt = sql::upsert_many(
            self.executor.dialect(),
            table,
            rows,
            conflict_columns,
            update_columns,
        )?;
        debug!(sql = %stmt.sql, "upsert_many");
        self.executor.execute_many(&stmt.sql, &stmt.batches).await
    }

    /// Update rows matching `filter`. An empty filter is refused.
    #[instrument(skip(self, values, filter), fields(table = %table))]
    pub async fn update_rows(
        &self,
        table: &str,
        values: &RowData,
        filter: impl IntoFilter,
    ) -> DbResult<u64> {
        let filter = filter.into_filter()?;
        let stmt = sql::update(self.executor.dialect(), table, values, filter.as_ref())?;
        debug!(sql = %stmt.sql, params = stmt.params.len(), "update_rows");
        self.executor.execute(&stmt.sql, &stmt.params).await
    }

    /// Delete rows matching `filter`. An empty filter is refused.
    #[instrument(skip(self, filter), fields(table = %table))]
    pub async fn delete_rows(&self, table: &str, filter: impl IntoFilter) -> DbResult<u64> {
        let filter = filter.into_filter()?;
        let stmt = sql::delete(self.executor.dialect(), table, filter.as_ref())?;
        debug!(sql = %stmt.sql, params = stmt.params.len(), "delete_rows");
        self.executor.execute(&stmt.sql, &stmt.params).await
    }

    /// Count rows matching `filter`.
    #[instrument(skip(self, filter), fields(table = %table))]
    pub async fn count_rows(&self, table: &str, filter: impl IntoFilter) -> DbResult<u64> {
        let filter = filter.into_filter()?;
        let stmt = sql::count(self.executor.dialect(), table, filter.as_ref())?;
        match self.executor.fetch_one(&stmt.sql, &stmt.params).await? {
            Some(row) => row.get::<u64>("count"),
            None => Ok(0),
        }
    }

    /// Whether any row matches `filter`.
    #[instrument(skip(self, filter), fields(table = %table))]
    pub async fn exists(&self, table: &str, filter: impl IntoFilter) -> DbResult<bool> {
        let filter = filter.into_filter()?;
        let stmt = sql::exists(self.executor.dialect(), table, filter.as_ref())?;
        Ok(self.executor.fetch_one(&stmt.sql, &stmt.params).await?.is_some())
    }
}
