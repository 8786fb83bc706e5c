use log_sink_adapters::database::DatabaseAdapter;
use log_sink_adapters::sqlite::SqliteExecutor;
use log_sink_adapters::{Level, LogRecord, LogSink};
use sqlx::Row;

/// Writes a committed and a rolled back transaction into an in-memory
/// database and prints what ended up in the table.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let executor = SqliteExecutor::connect("sqlite::memory:").await?;
    executor.ensure_log_table("logs").await?;
    let conn = executor.connection();

    let mut adapter = DatabaseAdapter::new(Box::new(executor), "checkout", "logs")?;

    adapter.begin().await?;
    for i in 1..=3 {
        adapter
            .process(&LogRecord::new(Level::Error, format!("Error message #{}", i)))
            .await?;
    }
    adapter.commit().await?;

    adapter.begin().await?;
    adapter.process(&LogRecord::new(Level::Info, "never stored")).await?;
    adapter.rollback().await?;

    let mut conn = conn.lock().await;
    let rows = sqlx::query("SELECT name, type, content FROM logs ORDER BY id")
        .fetch_all(&mut *conn)
        .await?;
    for row in rows {
        let name: String = row.try_get("name")?;
        let level: i64 = row.try_get("type")?;
        let content: String = row.try_get("content")?;
        println!("{} {} {}", name, level, content);
    }
    Ok(())
}
