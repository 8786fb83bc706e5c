use crate::error::{AdapterError, BoxError};
use crate::queue::BatchQueue;
use crate::record::{Level, LogRecord};
use crate::sink::LogSink;
use async_trait::async_trait;
use serde::Serialize;

const SINK: &str = "slack";

/// Slack Web API method used to post a message.
pub const SLACK_URL: &str = "https://slack.com/api/chat.postMessage";

/// Attachment color for records below `WARNING`.
pub const NEUTRAL_COLOR: &str = "#e3e4e6";

/// HTTP handle able to POST url-encoded form fields.
#[async_trait]
pub trait HttpPoster: Send + Sync {
    /// POST `fields` to `url` and return the raw response body.
    async fn post_form(&self, url: &str, fields: &[(&str, String)]) -> Result<String, BoxError>;
}

/// Creates [`HttpPoster`] handles. The adapter asks for a new one after
/// every `close()`.
pub trait HttpConnector: Send + Sync {
    fn connect(&self) -> Result<Box<dyn HttpPoster>, BoxError>;
}

/// Attachment color for a record level.
pub fn level_to_color(level: Level) -> &'static str {
    match level {
        Level::Alert | Level::Critical | Level::Emergency | Level::Error => "danger",
        Level::Warning => "warning",
        _ => NEUTRAL_COLOR,
    }
}

#[derive(Serialize)]
struct Attachment<'a> {
    title: String,
    text: &'a str,
    color: &'static str,
}

/// Posts every record into a Slack channel through `chat.postMessage`.
///
/// Slack has no batch endpoint, so a committed transaction is delivered as
/// one POST per queued record. Each record leaves the queue only once its
/// POST succeeded.
pub struct SlackAdapter {
    connector: Box<dyn HttpConnector>,
    poster: Option<Box<dyn HttpPoster>>,
    token: String,
    channel: String,
    endpoint: String,
    queue: BatchQueue<LogRecord>,
}

impl SlackAdapter {
    /// Create the adapter and its HTTP handle.
    ///
    /// Fails when the token or channel is empty, or when the connector
    /// cannot produce a handle.
    pub fn new(
        connector: Box<dyn HttpConnector>,
        token: impl Into<String>,
        channel: impl Into<String>,
    ) -> Result<Self, AdapterError> {
        let token = token.into();
        let channel = channel.into();
        if token.is_empty() {
            return Err(AdapterError::construction(SINK, "API token is empty"));
        }
        if channel.is_empty() {
            return Err(AdapterError::construction(SINK, "channel is empty"));
        }

        let poster = connector
            .connect()
            .map_err(|e| AdapterError::construction(SINK, e.to_string()))?;

        Ok(SlackAdapter {
            connector,
            poster: Some(poster),
            token,
            channel,
            endpoint: SLACK_URL.to_string(),
            queue: BatchQueue::new(),
        })
    }

    /// Post to another URL than the public Slack API (proxy, test server).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn is_open(&self) -> bool {
        self.poster.is_some()
    }

    fn form_fields(&self, record: &LogRecord) -> Result<Vec<(&'static str, String)>, AdapterError> {
        let attachments = serde_json::to_string(&[Attachment {
            title: format!("Message | {}", record.level_name),
            text: &record.message,
            color: level_to_color(record.level),
        }])?;

        Ok(vec![
            ("token", self.token.clone()),
            ("channel", self.channel.clone()),
            ("attachments", attachments),
        ])
    }

    async fn post(&mut self, record: &LogRecord) -> Result<(), AdapterError> {
        let fields = self.form_fields(record)?;
        let poster = ensure_handle(&mut self.poster, &*self.connector)?;
        poster
            .post_form(&self.endpoint, &fields)
            .await
            .map_err(|e| AdapterError::io(SINK, e))?;
        Ok(())
    }
}

fn ensure_handle<'a>(
    poster: &'a mut Option<Box<dyn HttpPoster>>,
    connector: &dyn HttpConnector,
) -> Result<&'a dyn HttpPoster, AdapterError> {
    if poster.is_none() {
        *poster = Some(connector.connect().map_err(|e| AdapterError::io(SINK, e))?);
    }
    match poster.as_deref() {
        Some(handle) => Ok(handle),
        None => Err(AdapterError::construction(SINK, "HTTP handle unavailable")),
    }
}

#[async_trait]
impl LogSink for SlackAdapter {
    async fn process(&mut self, record: &LogRecord) -> Result<(), AdapterError> {
        if self.queue.is_active() {
            self.queue.push(record.clone());
            return Ok(());
        }
        self.post(record).await
    }

    async fn begin(&mut self) -> Result<(), AdapterError> {
        self.commit().await?;
        self.queue.activate();
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), AdapterError> {
        while self.queue.needs_flush() {
            let record = self.queue.pending()[0].clone();
            self.post(&record).await?;
            self.queue.drain_front(1);
        }
        self.queue.finish();
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), AdapterError> {
        self.queue.discard();
        Ok(())
    }

    async fn close(&mut self) -> Result<(), AdapterError> {
        self.poster = None;
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.queue.is_active()
    }
}

#[cfg(feature = "slack")]
pub use self::http::{ReqwestConnector, ReqwestPoster};

#[cfg(feature = "slack")]
mod http {
    use super::{HttpConnector, HttpPoster};
    use crate::error::BoxError;
    use async_trait::async_trait;
    use reqwest::Client;
    use std::time::Duration;

    /// Builds reqwest clients with a request timeout.
    #[derive(Debug, Clone)]
    pub struct ReqwestConnector {
        timeout: Duration,
    }

    impl ReqwestConnector {
        pub fn new(timeout: Duration) -> Self {
            ReqwestConnector { timeout }
        }
    }

    impl Default for ReqwestConnector {
        fn default() -> Self {
            ReqwestConnector::new(Duration::from_secs(10))
        }
    }

    impl HttpConnector for ReqwestConnector {
        fn connect(&self) -> Result<Box<dyn HttpPoster>, BoxError> {
            let client = Client::builder().timeout(self.timeout).build()?;
            Ok(Box::new(ReqwestPoster { client }))
        }
    }

    #[derive(Clone)]
    pub struct ReqwestPoster {
        client: Client,
    }

    #[async_trait]
    impl HttpPoster for ReqwestPoster {
        async fn post_form(&self, url: &str, fields: &[(&str, String)]) -> Result<String, BoxError> {
            let resp = self.client.post(url).form(fields).send().await?;
            let status = resp.status();
            let text = resp.text().await.unwrap_or_else(|_| "<no body>".to_string());
            if status.is_success() {
                Ok(text)
            } else {
                Err(format!("Slack API request failed with status {}: {}", status, text).into())
            }
        }
    }
}
