use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Severity of a [`LogRecord`].
///
/// Discriminants follow the numeric scale used by the host logger, where a
/// lower number is more severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Level {
    Emergency = 0,
    Critical = 1,
    Alert = 2,
    Error = 3,
    Warning = 4,
    Notice = 5,
    Info = 6,
    Debug = 7,
    Custom = 8,
}

impl Level {
    /// Numeric value bound into integer columns and payloads.
    pub fn as_i64(self) -> i64 {
        self as i64
    }

    /// Upper-case name, e.g. `"ERROR"`.
    pub fn name(self) -> &'static str {
        match self {
            Level::Emergency => "EMERGENCY",
            Level::Critical => "CRITICAL",
            Level::Alert => "ALERT",
            Level::Error => "ERROR",
            Level::Warning => "WARNING",
            Level::Notice => "NOTICE",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Custom => "CUSTOM",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<&tracing::Level> for Level {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::ERROR => Level::Error,
            tracing::Level::WARN => Level::Warning,
            tracing::Level::INFO => Level::Info,
            tracing::Level::DEBUG | tracing::Level::TRACE => Level::Debug,
        }
    }
}

/// One formatted log entry handed to an adapter.
///
/// Adapters only ever read records; batching adapters clone what they need
/// into their pending queue.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub level: Level,
    pub level_name: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub context: BTreeMap<String, serde_json::Value>,
}

impl LogRecord {
    /// Build a record stamped with the current time and an empty context.
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self::at(level, message, Utc::now())
    }

    /// Build a record with an explicit timestamp.
    pub fn at(level: Level, message: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        LogRecord {
            level,
            level_name: level.name().to_string(),
            message: message.into(),
            timestamp,
            context: BTreeMap::new(),
        }
    }

    /// Attach a context entry.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn unix_timestamp(&self) -> i64 {
        self.timestamp.timestamp()
    }

    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }
}
