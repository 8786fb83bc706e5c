use crate::database::{is_identifier, SqlExecutor, SqlParam};
use crate::error::BoxError;
use async_trait::async_trait;
use sqlx::sqlite::SqliteConnection;
use sqlx::Connection;
use std::sync::Arc;
use tokio::sync::Mutex;

/// [`SqlExecutor`] backed by a single sqlx SQLite connection.
///
/// One connection (rather than a pool) keeps `BEGIN`, the inserts and
/// `COMMIT` on the same session. The connection is shared behind a mutex so
/// the caller can keep querying it while the adapter owns the executor.
#[derive(Clone)]
pub struct SqliteExecutor {
    conn: Arc<Mutex<SqliteConnection>>,
}

impl SqliteExecutor {
    /// Open a connection from a sqlx URL such as `sqlite://logs.db` or
    /// `sqlite::memory:`.
    pub async fn connect(url: &str) -> Result<Self, BoxError> {
        let conn = SqliteConnection::connect(url).await?;
        Ok(Self::from_connection(Arc::new(Mutex::new(conn))))
    }

    pub fn from_connection(conn: Arc<Mutex<SqliteConnection>>) -> Self {
        SqliteExecutor { conn }
    }

    /// Shared handle to the underlying connection.
    pub fn connection(&self) -> Arc<Mutex<SqliteConnection>> {
        Arc::clone(&self.conn)
    }

    /// Create `table` with the layout expected by
    /// [`DatabaseAdapter`](crate::database::DatabaseAdapter) if it is missing.
    pub async fn ensure_log_table(&self, table: &str) -> Result<(), BoxError> {
        if !is_identifier(table) {
            return Err(format!("invalid table name {:?}", table).into());
        }
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} (\
             id INTEGER PRIMARY KEY, \
             name VARCHAR(32) DEFAULT NULL, \
             type INT NOT NULL, \
             content TEXT, \
             created_at INT NOT NULL)",
            table
        );
        let mut conn = self.conn.lock().await;
        sqlx::query(&ddl).execute(&mut *conn).await?;
        Ok(())
    }

    async fn run(&self, statement: &str) -> Result<(), BoxError> {
        let mut conn = self.conn.lock().await;
        sqlx::query(statement).execute(&mut *conn).await?;
        Ok(())
    }
}

#[async_trait]
impl SqlExecutor for SqliteExecutor {
    async fn execute(&self, statement: &str, params: &[SqlParam]) -> Result<(), BoxError> {
        let mut query = sqlx::query(statement);
        for param in params {
            query = match param {
                SqlParam::Str(value) => query.bind(value.clone()),
                SqlParam::Int(value) => query.bind(*value),
            };
        }

        let mut conn = self.conn.lock().await;
        query.execute(&mut *conn).await?;
        Ok(())
    }

    async fn begin(&self) -> Result<(), BoxError> {
        self.run("BEGIN").await
    }

    async fn commit(&self) -> Result<(), BoxError> {
        self.run("COMMIT").await
    }

    async fn rollback(&self) -> Result<(), BoxError> {
        self.run("ROLLBACK").await
    }
}
