use crate::error::{AdapterError, BoxError};
use crate::formatter::{Formatter, LineFormatter};
use crate::record::LogRecord;
use crate::sink::LogSink;
use async_trait::async_trait;

const SINK: &str = "database";

/// Declared type of a bound statement parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindType {
    Str,
    Int,
}

/// A typed value bound to a `?` placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlParam {
    Str(String),
    Int(i64),
}

impl SqlParam {
    pub fn bind_type(&self) -> BindType {
        match self {
            SqlParam::Str(_) => BindType::Str,
            SqlParam::Int(_) => BindType::Int,
        }
    }
}

/// SQL connection used by [`DatabaseAdapter`].
///
/// The connection lifecycle belongs to the caller: the adapter never opens
/// or closes it, it only runs statements and transaction control on it.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Run a statement with positional `?` placeholders.
    async fn execute(&self, statement: &str, params: &[SqlParam]) -> Result<(), BoxError>;

    async fn begin(&self) -> Result<(), BoxError>;

    async fn commit(&self) -> Result<(), BoxError>;

    async fn rollback(&self) -> Result<(), BoxError>;
}

/// Stores each record as one row of a table laid out as
/// `(id, name, type, content, created_at)`.
///
/// Transactions are delegated to the connection: rows written between
/// `begin` and `commit` become visible together, and `rollback` removes
/// them all.
pub struct DatabaseAdapter {
    executor: Box<dyn SqlExecutor>,
    name: String,
    table: String,
    formatter: Box<dyn Formatter>,
    in_transaction: bool,
}

impl DatabaseAdapter {
    /// Create an adapter writing into `table` under the logger `name`.
    ///
    /// The table name is placed into the statement text, so it must be a
    /// plain identifier (letters, digits, `_`, optionally schema-qualified).
    pub fn new(
        executor: Box<dyn SqlExecutor>,
        name: impl Into<String>,
        table: impl Into<String>,
    ) -> Result<Self, AdapterError> {
        let table = table.into();
        if !is_identifier(&table) {
            return Err(AdapterError::construction(
                SINK,
                format!("invalid table name {:?}", table),
            ));
        }

        Ok(DatabaseAdapter {
            executor,
            name: name.into(),
            table,
            formatter: Box::new(LineFormatter::default()),
            in_transaction: false,
        })
    }

    /// Replace the formatter used to render the `content` column.
    pub fn with_formatter(mut self, formatter: impl Formatter + 'static) -> Self {
        self.formatter = Box::new(formatter);
        self
    }

    fn insert_statement(&self) -> String {
        format!("INSERT INTO {} VALUES (null, ?, ?, ?, ?)", self.table)
    }
}

/// True for `name` or `schema.name` made of ASCII letters, digits and `_`.
pub fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

#[async_trait]
impl LogSink for DatabaseAdapter {
    async fn process(&mut self, record: &LogRecord) -> Result<(), AdapterError> {
        let params = [
            SqlParam::Str(self.name.clone()),
            SqlParam::Int(record.level.as_i64()),
            SqlParam::Str(self.formatter.format(record)),
            SqlParam::Int(record.unix_timestamp()),
        ];

        self.executor
            .execute(&self.insert_statement(), &params)
            .await
            .map_err(|e| AdapterError::io(SINK, e))
    }

    async fn begin(&mut self) -> Result<(), AdapterError> {
        if self.in_transaction {
            return Err(AdapterError::TransactionActive { sink: SINK });
        }
        self.executor.begin().await.map_err(|e| AdapterError::io(SINK, e))?;
        self.in_transaction = true;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), AdapterError> {
        if !self.in_transaction {
            return Ok(());
        }
        self.executor.commit().await.map_err(|e| AdapterError::io(SINK, e))?;
        self.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), AdapterError> {
        if !self.in_transaction {
            return Ok(());
        }
        self.executor.rollback().await.map_err(|e| AdapterError::io(SINK, e))?;
        self.in_transaction = false;
        Ok(())
    }

    /// The connection belongs to the caller; nothing to release here.
    async fn close(&mut self) -> Result<(), AdapterError> {
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Level;
    use chrono::{TimeZone, Utc};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Execute(String, Vec<SqlParam>),
        Begin,
        Commit,
        Rollback,
    }

    #[derive(Clone, Default)]
    struct RecordingExecutor {
        calls: Arc<Mutex<Vec<Call>>>,
        fail_commit: bool,
    }

    impl RecordingExecutor {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SqlExecutor for RecordingExecutor {
        async fn execute(&self, statement: &str, params: &[SqlParam]) -> Result<(), BoxError> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Execute(statement.to_string(), params.to_vec()));
            Ok(())
        }

        async fn begin(&self) -> Result<(), BoxError> {
            self.calls.lock().unwrap().push(Call::Begin);
            Ok(())
        }

        async fn commit(&self) -> Result<(), BoxError> {
            if self.fail_commit {
                return Err("database is locked".into());
            }
            self.calls.lock().unwrap().push(Call::Commit);
            Ok(())
        }

        async fn rollback(&self) -> Result<(), BoxError> {
            self.calls.lock().unwrap().push(Call::Rollback);
            Ok(())
        }
    }

    fn adapter(executor: &RecordingExecutor) -> DatabaseAdapter {
        DatabaseAdapter::new(Box::new(executor.clone()), "test", "logs").unwrap()
    }

    #[tokio::test]
    async fn process_binds_typed_parameters() {
        let executor = RecordingExecutor::default();
        let mut adapter = adapter(&executor).with_formatter(LineFormatter::new("%message%"));
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        adapter
            .process(&LogRecord::at(Level::Error, "boom", ts))
            .await
            .unwrap();

        let calls = executor.calls();
        assert_eq!(calls.len(), 1);
        let Call::Execute(sql, params) = &calls[0] else {
            panic!("expected an insert, got {:?}", calls[0]);
        };
        assert_eq!(sql, "INSERT INTO logs VALUES (null, ?, ?, ?, ?)");
        assert_eq!(
            params,
            &vec![
                SqlParam::Str("test".into()),
                SqlParam::Int(3),
                SqlParam::Str("boom".into()),
                SqlParam::Int(1_704_067_200),
            ]
        );
        let types: Vec<_> = params.iter().map(SqlParam::bind_type).collect();
        assert_eq!(types, [BindType::Str, BindType::Int, BindType::Str, BindType::Int]);
    }

    #[tokio::test]
    async fn transaction_is_delegated_to_the_connection() {
        let executor = RecordingExecutor::default();
        let mut adapter = adapter(&executor);

        adapter.begin().await.unwrap();
        assert!(adapter.in_transaction());
        adapter.process(&LogRecord::new(Level::Error, "a")).await.unwrap();
        adapter.commit().await.unwrap();
        assert!(!adapter.in_transaction());

        let calls = executor.calls();
        assert_eq!(calls.first(), Some(&Call::Begin));
        assert_eq!(calls.last(), Some(&Call::Commit));
    }

    #[tokio::test]
    async fn commit_and_rollback_without_begin_touch_nothing() {
        let executor = RecordingExecutor::default();
        let mut adapter = adapter(&executor);

        adapter.commit().await.unwrap();
        adapter.rollback().await.unwrap();

        assert!(executor.calls().is_empty());
    }

    #[tokio::test]
    async fn nested_begin_is_rejected() {
        let executor = RecordingExecutor::default();
        let mut adapter = adapter(&executor);

        adapter.begin().await.unwrap();
        let err = adapter.begin().await.unwrap_err();

        assert!(matches!(err, AdapterError::TransactionActive { sink: "database" }));
        assert_eq!(executor.calls(), vec![Call::Begin]);
    }

    #[tokio::test]
    async fn failed_commit_keeps_transaction_open() {
        let executor = RecordingExecutor {
            fail_commit: true,
            ..Default::default()
        };
        let mut adapter = adapter(&executor);

        adapter.begin().await.unwrap();
        let err = adapter.commit().await.unwrap_err();

        assert!(matches!(err, AdapterError::Io { sink: "database", .. }));
        assert!(adapter.in_transaction());
    }

    #[test]
    fn table_name_must_be_an_identifier() {
        let executor = RecordingExecutor::default();
        assert!(DatabaseAdapter::new(Box::new(executor.clone()), "t", "main.logs").is_ok());
        assert!(DatabaseAdapter::new(Box::new(executor.clone()), "t", "logs; DROP TABLE x").is_err());
        assert!(DatabaseAdapter::new(Box::new(executor), "t", "").is_err());
    }
}
