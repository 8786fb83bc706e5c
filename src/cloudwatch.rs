use crate::error::{AdapterError, BoxError};
use crate::queue::BatchQueue;
use crate::record::LogRecord;
use crate::sink::LogSink;
use async_trait::async_trait;
use serde::Serialize;

const SINK: &str = "cloudwatch";

/// One event of a `PutLogEvents` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputLogEvent {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub message: String,
}

impl From<&LogRecord> for InputLogEvent {
    fn from(record: &LogRecord) -> Self {
        InputLogEvent {
            timestamp: record.timestamp_millis(),
            message: record.message.clone(),
        }
    }
}

/// Stream entry returned by `DescribeLogStreams`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogStreamDescriptor {
    pub name: String,
    pub upload_sequence_token: Option<String>,
}

/// Result of an accepted `PutLogEvents` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutLogEventsOutput {
    pub next_sequence_token: Option<String>,
}

/// Client for the log ingestion API.
#[async_trait]
pub trait LogIngestionClient: Send + Sync {
    /// Append `events` to a stream. `sequence_token` must be left out
    /// (`None`) for the first write to a fresh stream.
    async fn put_log_events(
        &self,
        group: &str,
        stream: &str,
        events: &[InputLogEvent],
        sequence_token: Option<&str>,
    ) -> Result<PutLogEventsOutput, BoxError>;

    /// List the streams of `group` whose name starts with `stream_name_prefix`.
    async fn describe_log_streams(
        &self,
        group: &str,
        stream_name_prefix: &str,
    ) -> Result<Vec<LogStreamDescriptor>, BoxError>;
}

/// Upload sequence token of one (group, stream) pair.
///
/// The token always equals the value returned by the last accepted write,
/// or the stream's upload token found at bootstrap, or nothing for a fresh
/// stream. A failed write leaves it untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceTracker {
    token: Option<String>,
}

impl SequenceTracker {
    pub fn new(token: Option<String>) -> Self {
        SequenceTracker { token }
    }

    /// Fetch the current token of `stream` from the service.
    pub async fn bootstrap(
        client: &dyn LogIngestionClient,
        group: &str,
        stream: &str,
    ) -> Result<Self, BoxError> {
        let descriptors = client.describe_log_streams(group, stream).await?;
        let tracker = Self::from_descriptors(&descriptors, stream);
        tracing::debug!(
            group,
            stream,
            has_token = tracker.token.is_some(),
            "cloudwatch sequence token bootstrapped"
        );
        Ok(tracker)
    }

    /// Pick the token of the descriptor named exactly `stream`. Prefix
    /// matches of other streams are ignored.
    pub fn from_descriptors(descriptors: &[LogStreamDescriptor], stream: &str) -> Self {
        let token = descriptors
            .iter()
            .find(|d| d.name == stream)
            .and_then(|d| d.upload_sequence_token.clone());
        SequenceTracker { token }
    }

    pub fn current(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Write `events` with the current token and keep the one returned.
    pub async fn put(
        &mut self,
        client: &dyn LogIngestionClient,
        group: &str,
        stream: &str,
        events: &[InputLogEvent],
    ) -> Result<(), BoxError> {
        let output = client
            .put_log_events(group, stream, events, self.current())
            .await?;
        self.token = output.next_sequence_token;
        Ok(())
    }
}

/// Ships records to a CloudWatch Logs stream.
///
/// A committed transaction becomes one `PutLogEvents` call carrying every
/// queued event in call order. A rejected sequence token is returned as an
/// I/O error; the adapter does not re-fetch it. Build a new adapter with
/// [`connect`](Self::connect) to resynchronise.
///
/// Two adapters writing the same stream each track their own token and will
/// invalidate each other's.
pub struct CloudWatchAdapter {
    client: Box<dyn LogIngestionClient>,
    group: String,
    stream: String,
    tracker: SequenceTracker,
    queue: BatchQueue<InputLogEvent>,
}

impl CloudWatchAdapter {
    /// Create the adapter, bootstrapping the sequence token from the
    /// stream's current state.
    pub async fn connect(
        client: Box<dyn LogIngestionClient>,
        group: impl Into<String>,
        stream: impl Into<String>,
    ) -> Result<Self, AdapterError> {
        let group = group.into();
        let stream = stream.into();
        let tracker = SequenceTracker::bootstrap(&*client, &group, &stream)
            .await
            .map_err(|e| AdapterError::io(SINK, e))?;

        Ok(Self::with_tracker(client, group, stream, tracker))
    }

    /// Create the adapter with an already known token state.
    pub fn with_tracker(
        client: Box<dyn LogIngestionClient>,
        group: impl Into<String>,
        stream: impl Into<String>,
        tracker: SequenceTracker,
    ) -> Self {
        CloudWatchAdapter {
            client,
            group: group.into(),
            stream: stream.into(),
            tracker,
            queue: BatchQueue::new(),
        }
    }

    pub fn sequence_token(&self) -> Option<&str> {
        self.tracker.current()
    }

    pub fn pending(&self) -> &[InputLogEvent] {
        self.queue.pending()
    }
}

#[async_trait]
impl LogSink for CloudWatchAdapter {
    async fn process(&mut self, record: &LogRecord) -> Result<(), AdapterError> {
        let event = InputLogEvent::from(record);
        if self.queue.is_active() {
            self.queue.push(event);
            return Ok(());
        }

        self.tracker
            .put(&*self.client, &self.group, &self.stream, std::slice::from_ref(&event))
            .await
            .map_err(|e| AdapterError::io(SINK, e))
    }

    /// Flushes anything already pending, then starts a new transaction.
    async fn begin(&mut self) -> Result<(), AdapterError> {
        self.commit().await?;
        self.queue.activate();
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), AdapterError> {
        if self.queue.needs_flush() {
            self.tracker
                .put(&*self.client, &self.group, &self.stream, self.queue.pending())
                .await
                .map_err(|e| AdapterError::io(SINK, e))?;
            tracing::trace!(events = self.queue.len(), "cloudwatch batch committed");
        }
        self.queue.finish();
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), AdapterError> {
        self.queue.discard();
        Ok(())
    }

    /// The client is shared infrastructure; nothing to release.
    async fn close(&mut self) -> Result<(), AdapterError> {
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.queue.is_active()
    }
}
