//! # watchdog-query
//!
//! Database access layer for the LOF fund watchdog.
//!
//! This crate holds everything that does not depend on a particular driver:
//! - Process-wide connection settings ([`ConfigStore`])
//! - A bounded, lazily created connection pool ([`ConnectionPool`])
//! - Parameterized statement execution ([`StatementExecutor`])
//! - Scoped transactions that statements join automatically ([`Transaction`])
//! - Single-table record access ([`RecordAccess`])
//! - Filters, either typed ([`FilterExpression`]) or in key/value shorthand
//!   ([`FilterMap`]), compiled to placeholder SQL
//!
//! Drivers plug in through the [`Connector`] and [`Session`] traits; see the
//! `watchdog-mysql` and `watchdog-sqlite` crates.
//!
//! ## Filters
//!
//! ```rust
//! use watchdog_query::{filter, sql, Dialect, FilterExpression, IntoFilter};
//!
//! let typed = FilterExpression::and([
//!     FilterExpression::gt("age", 18),
//!     FilterExpression::or([
//!         FilterExpression::eq("status", "active"),
//!         FilterExpression::eq("status", "trial"),
//!     ]),
//! ]);
//!
//! let shorthand = filter! {
//!     "age" => (">", 18),
//!     "OR" => [filter! { "status" => "active" }, filter! { "status" => "trial" }],
//! };
//!
//! let a = sql::compile_where(Dialect::MySql, Some(&typed)).unwrap();
//! let b = sql::compile_where(Dialect::MySql, shorthand.into_filter().unwrap().as_ref()).unwrap();
//! assert_eq!(a, b);
//! assert_eq!(a.sql, "WHERE `age` > ? AND (`status` = ? OR `status` = ?)");
//! ```
//!
//! ## Record access
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use watchdog_query::{row, ConfigStore, ConnectionPool, RecordAccess};
//!
//! let store = Arc::new(ConfigStore::from_env()?);
//! let pool = Arc::new(ConnectionPool::new(store, connector));
//! let dao = RecordAccess::from_pool(pool);
//!
//! dao.insert_row("fund", &row! { "code" => "161725", "name" => "Liquor" }).await?;
//! let n = dao.count_rows("fund", ()).await?;
//! ```

pub mod config;
pub mod dao;
pub mod error;
pub mod executor;
pub mod filter;
pub mod pool;
pub mod row;
pub mod session;
pub mod sql;
pub mod transaction;
pub mod value;

#[cfg(test)]
mod testing;

pub use config::{ConfigSnapshot, ConfigStore, ConnectionParameters, PoolParameters};
pub use dao::{InsertOutcome, RecordAccess};
pub use error::{
    ConfigurationError, ConnectionError, ConnectionErrorKind, DbError, DbResult, ErrorCode,
    QueryError, ValidationError, ValidationErrorKind,
};
pub use executor::{Executor, StatementExecutor};
pub use filter::{
    CompareOp, Condition, FilterExpression, FilterMap, IntoFilter, NullMode, PatternMode, SetMode,
};
pub use pool::{ConnectionPool, PoolStatus, PooledConnection};
pub use row::RowData;
pub use session::{Connector, ExecOutcome, Session};
pub use sql::{Dialect, SelectOptions, SortOrder, SqlBuilder, Statement};
pub use transaction::{Transaction, current_transaction};
pub use value::{FromValue, Value};
