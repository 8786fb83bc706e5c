use crate::error::AdapterError;
use crate::record::LogRecord;
use async_trait::async_trait;

/// Destination for [`LogRecord`]s with an optional transactional batch.
///
/// An adapter is owned by a single caller; every operation runs to
/// completion when awaited and there is no internal concurrency. Timeouts
/// come from the sink client configuration, never from the adapter.
///
/// The batch contract shared by all adapters:
///
/// - outside a transaction, `process` writes the record immediately;
/// - between `begin` and `commit`, `process` only queues (or, for sinks with
///   native transactions, writes inside the open transaction);
/// - `commit` with nothing pending is a no-op that still ends the
///   transaction;
/// - a failed write is returned to the caller as is, and the pending queue
///   is kept so `commit` can be retried.
#[async_trait]
pub trait LogSink: Send {
    /// Write a single record, or queue it when a transaction is active.
    async fn process(&mut self, record: &LogRecord) -> Result<(), AdapterError>;

    /// Start a transaction.
    async fn begin(&mut self) -> Result<(), AdapterError>;

    /// Flush the transaction as one unit and end it.
    async fn commit(&mut self) -> Result<(), AdapterError>;

    /// Abandon the transaction without writing what it queued.
    async fn rollback(&mut self) -> Result<(), AdapterError>;

    /// Release the held client handle, if any. Safe to call repeatedly.
    async fn close(&mut self) -> Result<(), AdapterError>;

    /// Whether a transaction is currently open.
    fn in_transaction(&self) -> bool;

    /// Flush whatever is pending and release the handle.
    ///
    /// The handle is released even when the final commit fails; the commit
    /// error is returned afterwards.
    async fn shutdown(&mut self) -> Result<(), AdapterError> {
        let committed = self.commit().await;
        self.close().await?;
        committed
    }
}

