//! Core collector traits and types.

use std::time::Duration;

use thiserror::Error;

use crate::event::{EventKind, NormalizedEvent};
use crate::telemetry::MeasurementPoint;

/// Minimum allowed poll interval (1 second).
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Default upstream request timeout (10 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that can occur during one collection cycle.
///
/// None of these end the poll loop: the cycle is skipped and the collector
/// sleeps until the next one.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// HTTP transport error.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Deadline elapsed before the upstream answered.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Upstream answered with a non-success status.
    #[error("unexpected HTTP status {0}")]
    Status(u16),

    /// Body did not match the expected record list.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),
}

/// Raw upstream response.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub status: u16,
    pub body: Vec<u8>,
}

impl Fetched {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Per-source settings shared by every source kind.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Collector name used in logs.
    pub name: String,
    pub kind: EventKind,
    /// Full endpoint URL.
    pub url: String,
    /// Client id sent with every request.
    pub token: String,
    pub interval: Duration,
    /// Deadline for a single fetch.
    pub timeout: Duration,
}

impl SourceConfig {
    pub fn new(
        kind: EventKind,
        url: impl Into<String>,
        token: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self {
            name: format!("{kind}s"),
            kind,
            url: url.into(),
            token: token.into(),
            interval,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Capability set of one upstream data source.
///
/// The poll loop in [`Collector`](crate::collector::Collector) is shared; a
/// source only knows how to fetch its endpoint, decode the body into records
/// and wrap each record in an event.
#[async_trait::async_trait]
pub trait Source: Send + Sync + 'static {
    /// Decoded record type.
    type Record: Send + 'static;

    fn config(&self) -> &SourceConfig;

    /// Issue one request. The caller applies the configured deadline.
    async fn fetch(&self) -> Result<Fetched, CollectorError>;

    /// Decode a response body into its records, in upstream order.
    fn decode(&self, body: &[u8]) -> Result<Vec<Self::Record>, CollectorError>;

    fn normalize(&self, record: Self::Record) -> NormalizedEvent;

    /// Per-record dashboard point. Only called when telemetry is enabled.
    fn summarize(&self, _record: &Self::Record) -> Option<MeasurementPoint> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_config_defaults() {
        let config = SourceConfig::new(
            EventKind::Clip,
            "https://api.twitch.tv/kraken/clips/top",
            "token",
            Duration::from_secs(120),
        );
        assert_eq!(config.name, "clips");
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);

        let config = config
            .with_name("top-clips")
            .with_timeout(Duration::from_secs(3));
        assert_eq!(config.name, "top-clips");
        assert_eq!(config.timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_fetched_status() {
        assert!(Fetched::ok("[]").is_success());
        let fetched = Fetched {
            status: 503,
            body: Vec::new(),
        };
        assert!(!fetched.is_success());
    }
}
