use crate::error::AdapterError;
use crate::record::LogRecord;
use crate::sink::LogSink;
use async_trait::async_trait;

/// An adapter that simply drops all records.
///
/// Useful for measuring the overhead of the tracing bridge without any
/// external I/O, and for tests that don't care about persistence. It still
/// honours the transaction flag so callers see consistent state.
#[derive(Clone, Default)]
pub struct NoopSink {
    in_transaction: bool,
}

#[async_trait]
impl LogSink for NoopSink {
    async fn process(&mut self, _record: &LogRecord) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn begin(&mut self) -> Result<(), AdapterError> {
        self.in_transaction = true;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), AdapterError> {
        self.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), AdapterError> {
        self.in_transaction = false;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), AdapterError> {
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction
    }
}
