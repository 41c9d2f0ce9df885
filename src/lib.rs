//! # watchdog-db
//!
//! Database access layer for the LOF fund watchdog.
//!
//! Provides:
//! - Process-wide connection settings, loadable from the environment, a URL
//!   or TOML
//! - A bounded connection pool, created on first use and rebuilt on demand
//! - Parameterized statement execution with scoped transactions
//! - Select/insert/update/delete/count/exists/upsert helpers that refuse
//!   unconditional writes
//! - Filters in typed form or key/value shorthand, always compiled to
//!   placeholder SQL
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use watchdog_db::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), DbError> {
//!     let store = Arc::new(ConfigStore::from_env()?);
//!     let dao = RecordAccess::from_pool(Arc::new(MysqlConnector::pool(store)));
//!
//!     dao.upsert_many(
//!         "price",
//!         &[row! { "code" => "161725", "date" => "2024-06-03", "price" => 1.042 }],
//!         &["code", "date"],
//!         &[],
//!     )
//!     .await?;
//!
//!     let open = dao
//!         .select_rows(
//!             "fund",
//!             &["code", "name"],
//!             filter! { "status" => ("IN", vec!["open", "limited"]) },
//!             &SelectOptions::new().asc("code"),
//!         )
//!         .await?;
//!     println!("{} funds open", open.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Transactions
//!
//! ```rust,ignore
//! let executor = dao.executor().clone();
//! executor
//!     .transaction(|_tx| async move {
//!         // Statements issued here through `dao` join the transaction.
//!         dao.delete_rows("price", filter! { "code" => "161725" }).await?;
//!         dao.insert_many("price", &rows).await?;
//!         Ok::<_, DbError>(())
//!     })
//!     .await?;
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub use watchdog_query::*;

/// MySQL driver.
#[cfg(feature = "mysql")]
#[cfg_attr(docsrs, doc(cfg(feature = "mysql")))]
pub mod mysql {
    pub use watchdog_mysql::*;
}

/// SQLite driver.
#[cfg(feature = "sqlite")]
#[cfg_attr(docsrs, doc(cfg(feature = "sqlite")))]
pub mod sqlite {
    pub use watchdog_sqlite::*;
}

#[cfg(feature = "logging")]
#[cfg_attr(docsrs, doc(cfg(feature = "logging")))]
pub mod logging;

/// Common imports.
pub mod prelude {
    pub use watchdog_query::{
        ConfigStore, ConnectionParameters, ConnectionPool, DbError, DbResult, Executor,
        FilterExpression, FilterMap, IntoFilter, PoolParameters, RecordAccess, RowData,
        SelectOptions, SortOrder, StatementExecutor, Transaction, Value, current_transaction,
        filter, row,
    };

    #[cfg(feature = "mysql")]
    pub use watchdog_mysql::MysqlConnector;

    #[cfg(feature = "sqlite")]
    pub use watchdog_sqlite::SqliteConnector;
}
