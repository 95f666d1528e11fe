//! Outbound pub/sub connection.

use std::time::Duration;

use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tokio::time::Instant;
use url::Url;

use crate::event::NormalizedEvent;
use crate::publisher::PublishError;

/// Default back-off after a transport failure (5 seconds).
pub const DEFAULT_RECONNECT_BACKOFF: Duration = Duration::from_secs(5);

/// Default deadline for one outbound request (10 seconds).
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(10);

/// Header carrying the application key.
pub const APP_KEY_HEADER: &str = "X-App-Key";

/// Outbound pub/sub connection owned by the publisher.
///
/// Only the publisher task touches its sink, so mutation goes through
/// `&mut self`.
#[async_trait::async_trait]
pub trait EventSink: Send + Sync + 'static {
    /// Open the connection. Failing here aborts startup.
    async fn start(&mut self) -> Result<(), PublishError>;

    /// Whether an event published now would be attempted.
    fn is_connected(&self) -> bool;

    /// Publish one envelope exactly as received.
    async fn publish(&mut self, event: &NormalizedEvent) -> Result<(), PublishError>;

    /// Release the connection.
    async fn stop(&mut self);
}

/// Target channel, endpoint and credential triple.
#[derive(Clone)]
pub struct HttpSinkSettings {
    pub endpoint: String,
    pub channel: String,
    pub app_key: String,
    pub role: String,
    pub secret: String,
    pub timeout: Duration,
    pub reconnect_backoff: Duration,
}

impl std::fmt::Debug for HttpSinkSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSinkSettings")
            .field("endpoint", &self.endpoint)
            .field("channel", &self.channel)
            .field("role", &self.role)
            .field("timeout", &self.timeout)
            .field("reconnect_backoff", &self.reconnect_backoff)
            .finish_non_exhaustive()
    }
}

impl HttpSinkSettings {
    pub fn new(
        endpoint: impl Into<String>,
        channel: impl Into<String>,
        app_key: impl Into<String>,
        role: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            channel: channel.into(),
            app_key: app_key.into(),
            role: role.into(),
            secret: secret.into(),
            timeout: DEFAULT_PUBLISH_TIMEOUT,
            reconnect_backoff: DEFAULT_RECONNECT_BACKOFF,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_reconnect_backoff(mut self, backoff: Duration) -> Self {
        self.reconnect_backoff = backoff;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Connection {
    Idle,
    Connected,
    /// Disconnected until the deadline, then the next publish retries.
    Backoff(Instant),
    Stopped,
}

/// Pub/sub endpoint reached over HTTP.
///
/// `start` probes the endpoint with a GET; each event is POSTed to
/// `<endpoint>/channels/<channel>`.
#[derive(Debug)]
pub struct HttpEventSink {
    client: Client,
    settings: HttpSinkSettings,
    publish_url: Url,
    state: Connection,
}

impl HttpEventSink {
    /// # Errors
    /// Returns `PublishError::Config` for an unusable endpoint URL.
    pub fn new(settings: HttpSinkSettings) -> Result<Self, PublishError> {
        let publish_url = publish_url(&settings.endpoint, &settings.channel)?;
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| PublishError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            settings,
            publish_url,
            state: Connection::Idle,
        })
    }

    pub fn publish_url(&self) -> &Url {
        &self.publish_url
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .basic_auth(&self.settings.role, Some(&self.settings.secret))
            .header(APP_KEY_HEADER, &self.settings.app_key)
    }
}

fn publish_url(endpoint: &str, channel: &str) -> Result<Url, PublishError> {
    let mut url = Url::parse(endpoint)
        .map_err(|e| PublishError::Config(format!("Invalid endpoint '{endpoint}': {e}")))?;
    url.path_segments_mut()
        .map_err(|()| PublishError::Config(format!("Endpoint '{endpoint}' cannot be a base")))?
        .pop_if_empty()
        .push("channels")
        .push(channel);
    Ok(url)
}

#[async_trait::async_trait]
impl EventSink for HttpEventSink {
    async fn start(&mut self) -> Result<(), PublishError> {
        let endpoint = self.settings.endpoint.clone();
        let response = self
            .request(self.client.get(&endpoint))
            .send()
            .await
            .map_err(|source| PublishError::Unreachable {
                endpoint: endpoint.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        self.state = Connection::Connected;
        tracing::info!(endpoint = %endpoint, channel = %self.settings.channel, "Event sink connected");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        match self.state {
            Connection::Connected => true,
            Connection::Backoff(until) => Instant::now() >= until,
            Connection::Idle | Connection::Stopped => false,
        }
    }

    async fn publish(&mut self, event: &NormalizedEvent) -> Result<(), PublishError> {
        let body = event.to_json()?;
        let sent = self
            .request(self.client.post(self.publish_url.clone()))
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await;

        let response = match sent {
            Ok(response) => response,
            Err(e) => {
                let backoff = self.settings.reconnect_backoff;
                tracing::warn!(error = %e, ?backoff, "Event sink disconnected");
                self.state = Connection::Backoff(Instant::now() + backoff);
                return Err(PublishError::Transport(e));
            }
        };

        if let Connection::Backoff(_) = self.state {
            tracing::info!("Event sink reconnected");
            self.state = Connection::Connected;
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    async fn stop(&mut self) {
        self.state = Connection::Stopped;
        tracing::info!("Event sink stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Clip;

    fn settings(endpoint: &str) -> HttpSinkSettings {
        HttpSinkSettings::new(endpoint, "twitch-events", "key", "producer", "secret")
    }

    #[test]
    fn test_publish_url() {
        let sink = HttpEventSink::new(settings("http://localhost:8080/")).unwrap();
        assert_eq!(
            sink.publish_url().as_str(),
            "http://localhost:8080/channels/twitch-events"
        );

        let sink = HttpEventSink::new(settings("https://rtm.example.com/v2")).unwrap();
        assert_eq!(
            sink.publish_url().as_str(),
            "https://rtm.example.com/v2/channels/twitch-events"
        );
    }

    #[test]
    fn test_invalid_endpoint() {
        assert!(matches!(
            HttpEventSink::new(settings("not a url")),
            Err(PublishError::Config(_))
        ));
        assert!(matches!(
            HttpEventSink::new(settings("mailto:someone@example.com")),
            Err(PublishError::Config(_))
        ));
    }

    #[test]
    fn test_settings_debug_hides_secrets() {
        let debug = format!("{:?}", settings("http://localhost"));
        assert!(debug.contains("producer"));
        assert!(!debug.contains("secret\""));
        assert!(!debug.contains("key\""));
    }

    #[tokio::test]
    async fn test_unreachable_on_start() {
        let mut sink = HttpEventSink::new(settings("http://127.0.0.1:1")).unwrap();
        assert!(!sink.is_connected());
        let err = sink.start().await.unwrap_err();
        assert!(matches!(err, PublishError::Unreachable { .. }));
        assert!(!sink.is_connected());
    }

    #[tokio::test]
    async fn test_transport_failure_starts_backoff() {
        let mut sink = HttpEventSink::new(
            settings("http://127.0.0.1:1").with_reconnect_backoff(Duration::from_secs(60)),
        )
        .unwrap();
        sink.state = Connection::Connected;

        let err = sink
            .publish(&NormalizedEvent::new(Clip::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Transport(_)));
        assert!(!sink.is_connected());
        assert!(matches!(sink.state, Connection::Backoff(_)));

        sink.stop().await;
        assert!(!sink.is_connected());
    }

    #[tokio::test]
    async fn test_backoff_expires() {
        let mut sink = HttpEventSink::new(settings("http://127.0.0.1:1")).unwrap();
        sink.state = Connection::Backoff(Instant::now());
        assert!(sink.is_connected());
    }
}
