//! Shared fixtures for the integration suite.
//!
//! Every test gets its own SQLite file in a temporary directory, so tests can
//! run in parallel without sharing state.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use watchdog_db::{
    ConfigStore, ConnectionParameters, ConnectionPool, Executor, PoolParameters, RecordAccess,
    RowData, row,
};
use watchdog_sqlite::SqliteConnector;

const SCHEMA: &[&str] = &[
    "CREATE TABLE fund (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        code TEXT NOT NULL UNIQUE,
        name TEXT,
        status TEXT,
        age INTEGER
    )",
    "CREATE TABLE price (
        code TEXT NOT NULL,
        date TEXT NOT NULL,
        price REAL,
        volume INTEGER,
        PRIMARY KEY (code, date)
    )",
];

pub struct TestDb {
    pub dir: TempDir,
    pub store: Arc<ConfigStore>,
    pub pool: Arc<ConnectionPool>,
    pub dao: RecordAccess,
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("watchdog_query=debug")
        .with_test_writer()
        .try_init();
}

pub fn pool_params() -> PoolParameters {
    PoolParameters::default()
        .max_connections(3)
        .min_cached(1)
        .max_cached(3)
        .wait_timeout(Duration::from_secs(5))
}

/// Pool over a fresh database with the watchdog tables created.
pub async fn setup_with(params: PoolParameters) -> TestDb {
    init_tracing();
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(ConfigStore::new(ConnectionParameters::new("watchdog_test"), params));
    let connector = SqliteConnector::new(dir.path().join("watchdog.db"));
    let pool = Arc::new(ConnectionPool::new(Arc::clone(&store), connector));
    let dao = RecordAccess::from_pool(Arc::clone(&pool));

    for ddl in SCHEMA {
        dao.executor().execute(ddl, &[]).await.expect("schema");
    }

    TestDb { dir, store, pool, dao }
}

pub async fn setup() -> TestDb {
    setup_with(pool_params()).await
}

pub fn funds() -> Vec<RowData> {
    vec![
        row! { "code" => "161725", "name" => "Liquor Index", "status" => "open", "age" => 9 },
        row! { "code" => "501018", "name" => "Crude Oil", "status" => "limited", "age" => 8 },
        row! { "code" => "160632", "name" => "Wine", "status" => "closed", "age" => 12 },
        row! { "code" => "162411", "name" => "Oil and Gas", "status" => "open", "age" => 13 },
        row! { "code" => "164906", "name" => "Overseas Internet", "status" => watchdog_db::Value::Null, "age" => 5 },
    ]
}

pub async fn seed_funds(db: &TestDb) {
    let n = db.dao.insert_many("fund", &funds()).await.expect("seed");
    assert_eq!(n, 5);
}
