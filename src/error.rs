use std::error::Error;

/// Error type returned by every sink client.
pub type BoxError = Box<dyn Error + Send + Sync>;

/// Error type returned by the adapter lifecycle operations.
#[derive(thiserror::Error, Debug)]
pub enum AdapterError {
    /// The adapter could not be built from the given coordinates or client.
    #[error("{sink} adapter could not be initialized: {reason}")]
    Construction { sink: &'static str, reason: String },

    /// The underlying sink client failed. Nothing was retried and any
    /// pending queue is left as it was.
    #[error("{sink} sink client failed: {source}")]
    Io {
        sink: &'static str,
        source: BoxError,
    },

    #[error("failed to encode log payload: {0}")]
    Encode(#[from] serde_json::Error),

    /// `begin()` was called while a native transaction is already open.
    #[error("{sink} adapter already has an open transaction")]
    TransactionActive { sink: &'static str },
}

impl AdapterError {
    pub(crate) fn io(sink: &'static str, source: BoxError) -> Self {
        AdapterError::Io { sink, source }
    }

    pub(crate) fn construction(sink: &'static str, reason: impl Into<String>) -> Self {
        AdapterError::Construction {
            sink,
            reason: reason.into(),
        }
    }
}
