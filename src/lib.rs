//! Transactional log sink adapters.
//!
//! Every adapter implements [`sink::LogSink`]: records are written as they
//! arrive, or grouped between `begin()` and `commit()` and flushed as one
//! unit. Sink clients are traits injected at construction so that each
//! adapter can run against a test double.

pub mod error;
pub mod record;
pub mod sink;
pub mod queue;
pub mod formatter;

pub mod cloudwatch;
#[cfg(feature = "cloudwatch")]
pub mod cloudwatch_http;
pub mod database;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod slack;
pub mod udp;

pub mod layer;
pub mod init;
pub mod backend;
pub mod env;
pub mod noop_sink;

pub use error::{AdapterError, BoxError};
pub use record::{Level, LogRecord};
pub use sink::LogSink;
