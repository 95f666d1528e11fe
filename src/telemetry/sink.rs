//! Metrics sink abstraction and the InfluxDB implementation.

use std::time::Duration;

use reqwest::Client;
use url::Url;

use crate::telemetry::TelemetryError;
use crate::telemetry::point::Batch;

/// Default write timeout (10 seconds).
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Destination for flushed batches.
#[async_trait::async_trait]
pub trait MetricsSink: Send + Sync + 'static {
    /// Transmit one batch. Called with non-empty batches only.
    async fn write(&self, batch: &Batch) -> Result<(), TelemetryError>;
}

/// Connection settings for an InfluxDB 1.x server.
#[derive(Debug, Clone)]
pub struct InfluxSettings {
    /// Base URL, e.g. `http://influxdb:8086`.
    pub url: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout: Duration,
}

impl InfluxSettings {
    pub fn new(url: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            database: database.into(),
            username: None,
            password: None,
            timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Writes batches through the InfluxDB `/write` endpoint as line protocol.
pub struct InfluxSink {
    client: Client,
    write_url: Url,
    settings: InfluxSettings,
}

impl InfluxSink {
    /// # Errors
    /// Returns `TelemetryError::Config` if the URL is invalid or the HTTP
    /// client cannot be built.
    pub fn new(settings: InfluxSettings) -> Result<Self, TelemetryError> {
        let mut write_url = Url::parse(&settings.url)
            .map_err(|e| TelemetryError::Config(format!("invalid InfluxDB url '{}': {e}", settings.url)))?;
        write_url
            .path_segments_mut()
            .map_err(|()| TelemetryError::Config(format!("invalid InfluxDB url '{}': cannot be a base", settings.url)))?
            .pop_if_empty()
            .push("write");
        write_url
            .query_pairs_mut()
            .append_pair("db", &settings.database)
            .append_pair("precision", "s");

        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| TelemetryError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            write_url,
            settings,
        })
    }

    pub fn write_url(&self) -> &Url {
        &self.write_url
    }
}

impl std::fmt::Debug for InfluxSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InfluxSink")
            .field("write_url", &self.write_url.as_str())
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl MetricsSink for InfluxSink {
    async fn write(&self, batch: &Batch) -> Result<(), TelemetryError> {
        let body = batch.to_line_protocol();
        if body.is_empty() {
            return Ok(());
        }

        let mut request = self.client.post(self.write_url.clone()).body(body);
        if let Some(ref username) = self.settings.username {
            request = request.basic_auth(username, self.settings.password.as_deref());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TelemetryError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(count = batch.len(), "Batch written to InfluxDB");
        Ok(())
    }
}
