//! Publisher error types.

use thiserror::Error;

/// Errors raised by an [`EventSink`](crate::publisher::EventSink).
#[derive(Debug, Error)]
pub enum PublishError {
    /// The sink could not be reached when starting. Fatal at startup.
    #[error("event sink unreachable at {endpoint}: {source}")]
    Unreachable {
        endpoint: String,
        source: reqwest::Error,
    },

    /// Transport failure while publishing.
    #[error("publish failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The sink answered with a non-success status.
    #[error("event rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The envelope could not be serialized.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),
}
