use crate::error::AdapterError;
use crate::record::{Level as RecordLevel, LogRecord};
use crate::sink::LogSink;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Target of the diagnostics emitted by this crate. Events under it or one
/// of its modules never reach an adapter.
const OWN_TARGET: &str = env!("CARGO_CRATE_NAME");

fn is_own_target(target: &str) -> bool {
    target
        .strip_prefix(OWN_TARGET)
        .map_or(false, |rest| rest.is_empty() || rest.starts_with("::"))
}

#[derive(Debug, Clone, Copy)]
enum ControlOp {
    Begin,
    Commit,
    Rollback,
    Shutdown,
}

enum Command {
    Record(LogRecord),
    Control(ControlOp, oneshot::Sender<Result<(), AdapterError>>),
}

/// Error returned by [`TransactionControl`].
#[derive(thiserror::Error, Debug)]
pub enum ControlError {
    #[error("adapter worker has stopped")]
    WorkerStopped,

    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

/// `tracing_subscriber` layer that turns events into [`LogRecord`]s and
/// hands them to a [`LogSink`] owned by a background task.
///
/// The task is the adapter's only caller, which gives the adapter the
/// single-owner usage it expects. Records and transaction commands travel
/// through the same bounded channel, so a `commit` issued after some events
/// sees those events queued. When the channel is full new records are
/// dropped and counted instead of blocking the application thread.
pub struct AdapterLayer {
    sender: mpsc::Sender<Command>,
    max_level: Level,
    /// Total events seen by the layer (before filtering by level).
    pub total_events: Arc<AtomicU64>,
    /// Records handed to the adapter by the worker.
    pub enqueued_events: Arc<AtomicU64>,
    /// Dropped because the channel was full.
    pub dropped_events: Arc<AtomicU64>,
}

impl AdapterLayer {
    /// Create the layer and spawn the worker owning `adapter`.
    ///
    /// Events more verbose than `max_level` are ignored. `buffer` is raised
    /// to at least 16.
    pub fn new(adapter: Box<dyn LogSink>, buffer: usize, max_level: Level) -> (Self, JoinHandle<()>) {
        let buffer = buffer.max(16);
        let (tx, rx) = mpsc::channel::<Command>(buffer);

        let total_events = Arc::new(AtomicU64::new(0));
        let enqueued_events = Arc::new(AtomicU64::new(0));
        let dropped_events = Arc::new(AtomicU64::new(0));

        let handle = tokio::spawn(run_worker(adapter, rx, Arc::clone(&enqueued_events)));

        (
            Self {
                sender: tx,
                max_level,
                total_events,
                enqueued_events,
                dropped_events,
            },
            handle,
        )
    }

    /// Handle for driving transactions on the adapter behind this layer.
    pub fn control(&self) -> TransactionControl {
        TransactionControl {
            sender: self.sender.clone(),
        }
    }
}

async fn run_worker(
    mut adapter: Box<dyn LogSink>,
    mut rx: mpsc::Receiver<Command>,
    enqueued_events: Arc<AtomicU64>,
) {
    while let Some(command) = rx.recv().await {
        match command {
            Command::Record(record) => {
                enqueued_events.fetch_add(1, Ordering::Relaxed);
                if let Err(e) = adapter.process(&record).await {
                    eprintln!("log adapter failed to process record: {}", e);
                }
            }
            Command::Control(op, reply) => {
                let result = match op {
                    ControlOp::Begin => adapter.begin().await,
                    ControlOp::Commit => adapter.commit().await,
                    ControlOp::Rollback => adapter.rollback().await,
                    ControlOp::Shutdown => {
                        let _ = reply.send(adapter.shutdown().await);
                        return;
                    }
                };
                let _ = reply.send(result);
            }
        }
    }

    // Every sender is gone: flush and release what the adapter holds.
    if let Err(e) = adapter.shutdown().await {
        eprintln!("log adapter failed to shut down: {}", e);
    }
}

/// Cloneable handle issuing transaction commands to the worker.
#[derive(Clone)]
pub struct TransactionControl {
    sender: mpsc::Sender<Command>,
}

impl TransactionControl {
    pub async fn begin(&self) -> Result<(), ControlError> {
        self.request(ControlOp::Begin).await
    }

    pub async fn commit(&self) -> Result<(), ControlError> {
        self.request(ControlOp::Commit).await
    }

    pub async fn rollback(&self) -> Result<(), ControlError> {
        self.request(ControlOp::Rollback).await
    }

    /// Commit what is pending, close the adapter and stop the worker.
    /// Records emitted afterwards are dropped.
    pub async fn shutdown(&self) -> Result<(), ControlError> {
        self.request(ControlOp::Shutdown).await
    }

    async fn request(&self, op: ControlOp) -> Result<(), ControlError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(Command::Control(op, reply_tx))
            .await
            .map_err(|_| ControlError::WorkerStopped)?;
        reply_rx.await.map_err(|_| ControlError::WorkerStopped)??;
        Ok(())
    }
}

impl<S> Layer<S> for AdapterLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event, _ctx: Context<'_, S>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        let meta = event.metadata();
        if *meta.level() > self.max_level || is_own_target(meta.target()) {
            return;
        }

        let mut context = BTreeMap::new();
        let mut message: Option<String> = None;

        let mut visitor = FieldVisitor {
            fields: &mut context,
            message: &mut message,
        };
        event.record(&mut visitor);

        let level = RecordLevel::from(meta.level());
        let record = LogRecord {
            level,
            level_name: level.name().to_string(),
            message: message.unwrap_or_default(),
            timestamp: Utc::now(),
            context,
        };

        if self.sender.try_send(Command::Record(record)).is_err() {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
    }
}

use tracing::field::{Field, Visit};

pub struct FieldVisitor<'a> {
    pub fields: &'a mut BTreeMap<String, serde_json::Value>,
    pub message: &'a mut Option<String>,
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else {
            self.fields.insert(field.name().to_string(), serde_json::Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.message = Some(format!("{:?}", value));
        } else {
            self.fields.insert(field.name().to_string(), serde_json::Value::String(format!("{:?}", value)));
        }
    }
}
