#![cfg(feature = "sqlite")]

use log_sink_adapters::backend::{make_sink_from_config, parse_dsn};
use log_sink_adapters::database::DatabaseAdapter;
use log_sink_adapters::sqlite::SqliteExecutor;
use log_sink_adapters::{Level, LogRecord, LogSink};
use sqlx::sqlite::SqliteConnection;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

async fn setup() -> (DatabaseAdapter, Arc<Mutex<SqliteConnection>>) {
    let executor = SqliteExecutor::connect("sqlite::memory:").await.unwrap();
    executor.ensure_log_table("logs").await.unwrap();
    let conn = executor.connection();
    let adapter = DatabaseAdapter::new(Box::new(executor), "test", "logs").unwrap();
    (adapter, conn)
}

async fn contents(conn: &Arc<Mutex<SqliteConnection>>) -> Vec<String> {
    let mut conn = conn.lock().await;
    sqlx::query_scalar::<_, String>("SELECT content FROM logs ORDER BY id")
        .fetch_all(&mut *conn)
        .await
        .unwrap()
}

#[tokio::test]
async fn single_record_is_inserted_immediately() {
    let (mut adapter, conn) = setup().await;

    adapter.process(&LogRecord::new(Level::Info, "Insert log")).await.unwrap();

    let rows = contents(&conn).await;
    assert_eq!(rows.len(), 1);
    assert!(rows[0].contains("Insert log"));
    assert!(rows[0].contains("[INFO]"));
}

#[tokio::test]
async fn committed_transaction_stores_every_record() {
    let (mut adapter, conn) = setup().await;

    adapter.begin().await.unwrap();
    for i in 1..=3 {
        adapter
            .process(&LogRecord::new(Level::Error, format!("Error message #{}", i)))
            .await
            .unwrap();
    }
    adapter.commit().await.unwrap();

    let rows = contents(&conn).await;
    assert_eq!(rows.len(), 3);
    for (i, row) in rows.iter().enumerate() {
        assert!(row.contains(&format!("Error message #{}", i + 1)), "row {:?}", row);
    }

    let mut guard = conn.lock().await;
    let (name, level): (String, i64) = sqlx::query_as("SELECT name, type FROM logs LIMIT 1")
        .fetch_one(&mut *guard)
        .await
        .unwrap();
    assert_eq!(name, "test");
    assert_eq!(level, Level::Error.as_i64());
}

#[tokio::test]
async fn rollback_leaves_no_rows() {
    let (mut adapter, conn) = setup().await;

    adapter.begin().await.unwrap();
    adapter.process(&LogRecord::new(Level::Error, "discarded #1")).await.unwrap();
    adapter.process(&LogRecord::new(Level::Error, "discarded #2")).await.unwrap();
    adapter.rollback().await.unwrap();

    assert!(contents(&conn).await.is_empty());
    assert!(!adapter.in_transaction());
}

#[tokio::test]
async fn parameters_are_bound_not_interpolated() {
    let (mut adapter, conn) = setup().await;

    let hostile = "'); DROP TABLE logs; --";
    adapter.process(&LogRecord::new(Level::Warning, hostile)).await.unwrap();

    let rows = contents(&conn).await;
    assert_eq!(rows.len(), 1);
    assert!(rows[0].ends_with(hostile));
}

#[tokio::test]
async fn close_is_a_no_op_for_the_caller_owned_connection() {
    let (mut adapter, conn) = setup().await;

    adapter.close().await.unwrap();
    adapter.close().await.unwrap();
    adapter.process(&LogRecord::new(Level::Notice, "still open")).await.unwrap();

    assert_eq!(contents(&conn).await.len(), 1);
}

#[tokio::test]
async fn table_name_with_sql_is_refused_without_running_ddl() {
    let executor = SqliteExecutor::connect("sqlite::memory:").await.unwrap();
    let conn = executor.connection();

    let injected = "logs(id INT); CREATE TABLE injected(x INT); --";
    assert!(executor.ensure_log_table(injected).await.is_err());
    assert!(DatabaseAdapter::new(Box::new(executor.clone()), "test", injected).is_err());

    let mut guard = conn.lock().await;
    let tables = sqlx::query_scalar::<_, String>("SELECT name FROM sqlite_master WHERE type = 'table'")
        .fetch_all(&mut *guard)
        .await
        .unwrap();
    assert!(tables.is_empty(), "unexpected tables {:?}", tables);
}

#[tokio::test]
async fn file_dsn_creates_missing_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fresh.db");
    assert!(!path.exists());

    let cfg = parse_dsn(&format!("sqlite://{}?table=audit", path.display())).unwrap();
    let mut adapter = make_sink_from_config(&cfg, Duration::from_secs(1)).await.unwrap();
    adapter.process(&LogRecord::new(Level::Error, "first row")).await.unwrap();
    adapter.shutdown().await.unwrap();

    assert!(path.exists());
}
