use async_trait::async_trait;
use tracing::{error, info};

use log_sink_adapters::init::init_tracing;
use log_sink_adapters::{AdapterError, LogRecord, LogSink};

/// Example of integrating a completely custom destination by implementing
/// the `LogSink` trait directly. Records are buffered during a transaction
/// and printed when it commits.
#[derive(Default)]
struct StdoutSink {
    pending: Vec<LogRecord>,
    in_transaction: bool,
}

#[async_trait]
impl LogSink for StdoutSink {
    async fn process(&mut self, record: &LogRecord) -> Result<(), AdapterError> {
        if self.in_transaction {
            self.pending.push(record.clone());
        } else {
            println!("[stdout-sink] {} {}", record.level_name, record.message);
        }
        Ok(())
    }

    async fn begin(&mut self) -> Result<(), AdapterError> {
        self.in_transaction = true;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), AdapterError> {
        for record in self.pending.drain(..) {
            println!("[stdout-sink] {} {}", record.level_name, record.message);
        }
        self.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), AdapterError> {
        self.pending.clear();
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

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let guard = init_tracing(Box::new(StdoutSink::default()))?;
    let control = guard.control();

    info!("custom backend example started");

    control.begin().await?;
    error!(db = "orders", "first error inside a transaction");
    error!(db = "orders", "second error inside a transaction");
    control.commit().await?;

    guard.shutdown().await?;
    Ok(())
}
