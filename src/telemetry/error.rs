//! Telemetry error types.

use thiserror::Error;

/// Errors raised by the telemetry pipeline.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// HTTP transport failure talking to the metrics sink.
    #[error("metrics transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The metrics sink answered with a non-success status.
    #[error("metrics sink rejected batch: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Point channel is full or closed; the point was dropped.
    #[error("point channel unavailable")]
    ChannelSend,

    /// Invalid sink settings.
    #[error("metrics config error: {0}")]
    Config(String),

    /// Internal error (e.g., task join failure).
    #[error("internal error: {0}")]
    Internal(String),
}
