//! Application configuration structures.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::collector::{MIN_INTERVAL, SourceConfig};
use crate::event::EventKind;
use crate::publisher::{DEFAULT_PUBLISH_TIMEOUT, DEFAULT_RECONNECT_BACKOFF, HttpSinkSettings};
use crate::source::{DEFAULT_BASE_URL, default_interval, endpoint_url};
use crate::telemetry::{
    DEFAULT_CHANNEL_CAPACITY, DEFAULT_FLUSH_INTERVAL, DEFAULT_SAMPLE_INTERVAL, InfluxSettings,
};

use super::validation::{ConfigError, expand_env_vars};

// =============================================================================
// Constants
// =============================================================================

/// Default upstream request timeout (10 seconds).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Port used when only the InfluxDB host is given.
pub const DEFAULT_INFLUX_PORT: u16 = 8086;

/// Placeholder printed instead of secrets.
pub const REDACTED: &str = "***";

/// Environment variables read when no configuration file exists.
pub const ENV_VARS: EnvVars = EnvVars {
    twitch_token: "TWITCH_TOKEN",
    channel: "SATORI_CHANNEL",
    endpoint: "SATORI_ENDPOINT",
    app_key: "SATORI_APP_KEY",
    role: "SATORI_ROLE",
    secret: "SATORI_SECRET",
    influx_addr: "INFLUXDB_PORT_8086_TCP_ADDR",
    influx_port: "INFLUXDB_PORT_8086_TCP_PORT",
    influx_username: "INFLUXDB_USERNAME",
    influx_password: "INFLUXDB_PASSWORD",
    influx_database: "INFLUXDB_DATABASE",
};

/// Names of the environment variables behind [`AppConfig::from_env`].
#[derive(Debug, Clone, Copy)]
pub struct EnvVars {
    pub twitch_token: &'static str,
    pub channel: &'static str,
    pub endpoint: &'static str,
    pub app_key: &'static str,
    pub role: &'static str,
    pub secret: &'static str,
    pub influx_addr: &'static str,
    pub influx_port: &'static str,
    pub influx_username: &'static str,
    pub influx_password: &'static str,
    pub influx_database: &'static str,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_request_timeout() -> Duration {
    DEFAULT_REQUEST_TIMEOUT
}

fn default_publish_timeout() -> Duration {
    DEFAULT_PUBLISH_TIMEOUT
}

fn default_reconnect_backoff() -> Duration {
    DEFAULT_RECONNECT_BACKOFF
}

fn default_flush_interval() -> Duration {
    DEFAULT_FLUSH_INTERVAL
}

fn default_sample_interval() -> Duration {
    DEFAULT_SAMPLE_INTERVAL
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

fn default_enabled() -> bool {
    true
}

// =============================================================================
// Twitch Configuration
// =============================================================================

/// Per-source overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSettings {
    /// Whether the collector runs (default: true).
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Poll interval; the listing's default when unset.
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub interval: Option<Duration>,

    /// Client id override for this source only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: None,
            token: None,
        }
    }
}

/// Settings of the four listings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub clips: SourceSettings,
    pub games: SourceSettings,
    pub streams: SourceSettings,
    pub videos: SourceSettings,
}

impl SourcesConfig {
    pub fn get(&self, kind: EventKind) -> &SourceSettings {
        match kind {
            EventKind::Clip => &self.clips,
            EventKind::Game => &self.games,
            EventKind::Stream => &self.streams,
            EventKind::Video => &self.videos,
        }
    }

    fn get_mut(&mut self, kind: EventKind) -> &mut SourceSettings {
        match kind {
            EventKind::Clip => &mut self.clips,
            EventKind::Game => &mut self.games,
            EventKind::Stream => &mut self.streams,
            EventKind::Video => &mut self.videos,
        }
    }
}

/// Upstream API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwitchConfig {
    /// API base URL (default: the public Kraken endpoint).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Client id sent with every request.
    pub token: String,

    /// Deadline for one upstream request (default: 10s).
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    #[serde(default)]
    pub sources: SourcesConfig,
}

impl TwitchConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            base_url: default_base_url(),
            token: token.into(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
            sources: SourcesConfig::default(),
        }
    }
}

// =============================================================================
// Publisher Configuration
// =============================================================================

/// Outbound pub/sub target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
    pub endpoint: String,
    pub channel: String,
    pub app_key: String,
    pub role: String,
    pub secret: String,

    /// Deadline for one outbound request (default: 10s).
    #[serde(default = "default_publish_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Time the sink stays disconnected after a transport error (default: 5s).
    #[serde(default = "default_reconnect_backoff", with = "humantime_serde")]
    pub reconnect_backoff: Duration,
}

impl PublisherConfig {
    pub fn to_sink_settings(&self) -> HttpSinkSettings {
        HttpSinkSettings::new(
            &self.endpoint,
            &self.channel,
            &self.app_key,
            &self.role,
            &self.secret,
        )
        .with_timeout(self.timeout)
        .with_reconnect_backoff(self.reconnect_backoff)
    }
}

// =============================================================================
// Metrics Configuration
// =============================================================================

/// InfluxDB metrics sink. Absent means telemetry is disabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Base URL, e.g. `http://influxdb:8086`.
    pub address: String,

    #[serde(default)]
    pub database: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Deadline for one batch write (default: 10s).
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Batch flush period (default: 30s).
    #[serde(default = "default_flush_interval", with = "humantime_serde")]
    pub flush_interval: Duration,

    /// Queue-depth sample period (default: 5s).
    #[serde(default = "default_sample_interval", with = "humantime_serde")]
    pub sample_interval: Duration,

    /// Point channel capacity (default: 10000).
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl MetricsConfig {
    pub fn new(address: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            database: database.into(),
            username: None,
            password: None,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn to_influx_settings(&self) -> InfluxSettings {
        let mut settings =
            InfluxSettings::new(&self.address, &self.database).with_timeout(self.timeout);
        if let Some(ref username) = self.username {
            settings = settings.with_credentials(
                username.as_str(),
                self.password.as_deref().unwrap_or_default(),
            );
        }
        settings
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub twitch: TwitchConfig,

    pub publisher: PublisherConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<MetricsConfig>,
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// `${VAR}` and `${VAR:-default}` references are expanded from the
    /// environment before parsing.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_yaml::from_str(&expand_env_vars(&content))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` when it exists, otherwise read the environment.
    pub fn load_or_env(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            tracing::info!(path = %path.display(), "Config file not found, reading environment");
            Self::from_env()
        }
    }

    /// Build the configuration from [`ENV_VARS`].
    ///
    /// # Errors
    /// Returns `ConfigError::MissingEnv` for an unset required variable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());
        let require = |name: &'static str| get(name).ok_or(ConfigError::MissingEnv(name));

        let twitch = TwitchConfig::new(require(ENV_VARS.twitch_token)?);
        let publisher = PublisherConfig {
            endpoint: require(ENV_VARS.endpoint)?,
            channel: require(ENV_VARS.channel)?,
            app_key: require(ENV_VARS.app_key)?,
            role: require(ENV_VARS.role)?,
            secret: require(ENV_VARS.secret)?,
            timeout: DEFAULT_PUBLISH_TIMEOUT,
            reconnect_backoff: DEFAULT_RECONNECT_BACKOFF,
        };

        let metrics = match (get(ENV_VARS.influx_addr), get(ENV_VARS.influx_database)) {
            (Some(addr), Some(database)) => {
                let port = match get(ENV_VARS.influx_port) {
                    Some(port) => port.parse::<u16>().map_err(|_| {
                        ConfigError::ValidationError(format!(
                            "{} is not a port: '{port}'",
                            ENV_VARS.influx_port
                        ))
                    })?,
                    None => DEFAULT_INFLUX_PORT,
                };
                let mut metrics = MetricsConfig::new(format!("http://{addr}:{port}"), database);
                metrics.username = get(ENV_VARS.influx_username);
                metrics.password = get(ENV_VARS.influx_password);
                Some(metrics)
            }
            _ => None,
        };

        let config = Self {
            twitch,
            publisher,
            metrics,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate twitch settings
        if self.twitch.token.trim().is_empty() {
            return Err(invalid("twitch token must not be empty"));
        }
        validate_url("twitch base_url", &self.twitch.base_url)?;
        if self.twitch.timeout.is_zero() {
            return Err(invalid("twitch timeout must be positive"));
        }
        for kind in EventKind::ALL {
            let settings = self.twitch.sources.get(kind);
            if let Some(interval) = settings.interval {
                if interval < MIN_INTERVAL {
                    return Err(invalid(format!(
                        "{kind} interval must be at least {MIN_INTERVAL:?}"
                    )));
                }
            }
            if settings.token.as_deref().is_some_and(|t| t.trim().is_empty()) {
                return Err(invalid(format!("{kind} token override must not be empty")));
            }
        }

        // Validate publisher settings
        let publisher = &self.publisher;
        for (name, value) in [
            ("endpoint", &publisher.endpoint),
            ("channel", &publisher.channel),
            ("app_key", &publisher.app_key),
            ("role", &publisher.role),
            ("secret", &publisher.secret),
        ] {
            if value.trim().is_empty() {
                return Err(invalid(format!("publisher {name} must not be empty")));
            }
        }
        validate_url("publisher endpoint", &publisher.endpoint)?;
        if publisher.timeout.is_zero() {
            return Err(invalid("publisher timeout must be positive"));
        }

        // Validate metrics settings
        if let Some(ref metrics) = self.metrics {
            validate_url("metrics address", &metrics.address)?;
            if metrics.database.trim().is_empty() {
                return Err(invalid("metrics database must not be empty"));
            }
            if metrics.timeout.is_zero()
                || metrics.flush_interval.is_zero()
                || metrics.sample_interval.is_zero()
            {
                return Err(invalid(
                    "metrics timeout, flush_interval and sample_interval must be positive",
                ));
            }
            if metrics.channel_capacity == 0 {
                return Err(invalid("metrics channel_capacity must be positive"));
            }
        }

        Ok(())
    }

    /// Collector settings of every enabled source, in start order.
    pub fn source_configs(&self) -> Vec<SourceConfig> {
        EventKind::ALL
            .into_iter()
            .filter_map(|kind| {
                let settings = self.twitch.sources.get(kind);
                if !settings.enabled {
                    tracing::debug!(kind = %kind, "Skipping disabled source");
                    return None;
                }
                let token = settings.token.as_deref().unwrap_or(&self.twitch.token);
                let interval = settings.interval.unwrap_or_else(|| default_interval(kind));
                Some(
                    SourceConfig::new(kind, endpoint_url(&self.twitch.base_url, kind), token, interval)
                        .with_timeout(self.twitch.timeout),
                )
            })
            .collect()
    }

    /// Copy with every credential replaced by [`REDACTED`].
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        config.twitch.token = REDACTED.to_string();
        for kind in EventKind::ALL {
            let settings = config.twitch.sources.get_mut(kind);
            if settings.token.is_some() {
                settings.token = Some(REDACTED.to_string());
            }
        }
        config.publisher.app_key = REDACTED.to_string();
        config.publisher.secret = REDACTED.to_string();
        if let Some(ref mut metrics) = config.metrics {
            if metrics.password.is_some() {
                metrics.password = Some(REDACTED.to_string());
            }
        }
        config
    }

    /// Render the redacted configuration as YAML.
    pub fn to_redacted_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(&self.redacted())?)
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(message.into())
}

fn validate_url(name: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value).map_err(|e| invalid(format!("invalid {name} '{value}': {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("{name} must be an http(s) URL: '{value}'")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    const FULL_CONFIG: &str = r#"
twitch:
  base_url: http://127.0.0.1:9000/kraken
  token: abc123
  timeout: 3s
  sources:
    clips:
      interval: 1m
    games:
      enabled: false
    videos:
      token: video-client
publisher:
  endpoint: https://pubsub.example.com
  channel: twitch-events
  app_key: app
  role: producer
  secret: hunter2
metrics:
  address: http://influxdb:8086
  database: twitch
  username: admin
  password: changeme
  flush_interval: 10s
"#;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn valid_config() -> AppConfig {
        serde_yaml::from_str(FULL_CONFIG).unwrap()
    }

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    const REQUIRED_ENV: [(&str, &str); 6] = [
        ("TWITCH_TOKEN", "abc123"),
        ("SATORI_CHANNEL", "twitch-events"),
        ("SATORI_ENDPOINT", "https://pubsub.example.com"),
        ("SATORI_APP_KEY", "app"),
        ("SATORI_ROLE", "producer"),
        ("SATORI_SECRET", "hunter2"),
    ];

    #[test]
    fn test_load_full_config() {
        let file = write_config(FULL_CONFIG);
        let config = AppConfig::load(file.path()).unwrap();

        assert_eq!(config.twitch.timeout, Duration::from_secs(3));
        assert_eq!(config.publisher.reconnect_backoff, DEFAULT_RECONNECT_BACKOFF);
        let metrics = config.metrics.as_ref().unwrap();
        assert_eq!(metrics.flush_interval, Duration::from_secs(10));
        assert_eq!(metrics.sample_interval, DEFAULT_SAMPLE_INTERVAL);
        assert_eq!(metrics.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
    }

    #[test]
    fn test_source_configs() {
        let configs = valid_config().source_configs();
        let kinds: Vec<_> = configs.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![EventKind::Clip, EventKind::Stream, EventKind::Video]);

        assert_eq!(configs[0].url, "http://127.0.0.1:9000/kraken/clips/top?limit=100");
        assert_eq!(configs[0].interval, Duration::from_secs(60));
        assert_eq!(configs[0].timeout, Duration::from_secs(3));
        assert_eq!(configs[0].token, "abc123");
        assert_eq!(configs[1].interval, Duration::from_secs(300));
        assert_eq!(configs[2].token, "video-client");
    }

    #[test]
    fn test_load_expands_env_vars() {
        let file = write_config(
            r#"
twitch:
  token: ${NONEXISTENT_RELAY_TOKEN_12345:-from-default}
publisher:
  endpoint: http://localhost:8080
  channel: events
  app_key: key
  role: role
  secret: ${NONEXISTENT_RELAY_SECRET_12345:-s3cret}
"#,
        );
        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.twitch.token, "from-default");
        assert_eq!(config.twitch.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.publisher.secret, "s3cret");
        assert!(config.metrics.is_none());
    }

    #[test]
    fn test_load_missing_file() {
        let result = AppConfig::load("/nonexistent/relay/config.yaml");
        assert!(matches!(result, Err(ConfigError::IoError(_))));
    }

    #[test]
    fn test_load_unset_token_fails_validation() {
        let file = write_config(
            r#"
twitch:
  token: ${NONEXISTENT_RELAY_TOKEN_12345}
publisher:
  endpoint: http://localhost:8080
  channel: events
  app_key: key
  role: role
  secret: secret
"#,
        );
        let err = AppConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("twitch token"));
    }

    #[test]
    fn test_validation_rejects_short_interval() {
        let mut config = valid_config();
        config.twitch.sources.streams.interval = Some(Duration::from_millis(500));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("stream interval"));
    }

    #[test]
    fn test_validation_rejects_empty_publisher_fields() {
        let mut config = valid_config();
        config.publisher.role = " ".to_string();
        assert!(config.validate().unwrap_err().to_string().contains("publisher role"));

        let mut config = valid_config();
        config.publisher.endpoint = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_metrics_without_database() {
        let mut config = valid_config();
        if let Some(ref mut metrics) = config.metrics {
            metrics.database = String::new();
        }
        assert!(config.validate().unwrap_err().to_string().contains("database"));

        let mut config = valid_config();
        if let Some(ref mut metrics) = config.metrics {
            metrics.channel_capacity = 0;
        }
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_env_required_only() {
        let config = AppConfig::from_lookup(env(&REQUIRED_ENV)).unwrap();
        assert_eq!(config.twitch.token, "abc123");
        assert_eq!(config.publisher.channel, "twitch-events");
        assert!(config.metrics.is_none());
        assert_eq!(config.source_configs().len(), 4);
    }

    #[test]
    fn test_from_env_missing_required() {
        let vars: Vec<_> = REQUIRED_ENV
            .into_iter()
            .filter(|(k, _)| *k != "SATORI_SECRET")
            .collect();
        let err = AppConfig::from_lookup(env(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnv("SATORI_SECRET")));

        let mut vars = REQUIRED_ENV.to_vec();
        vars[0] = ("TWITCH_TOKEN", "");
        let err = AppConfig::from_lookup(env(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnv("TWITCH_TOKEN")));
    }

    #[test]
    fn test_from_env_with_influx() {
        let mut vars = REQUIRED_ENV.to_vec();
        vars.extend([
            ("INFLUXDB_PORT_8086_TCP_ADDR", "10.0.0.5"),
            ("INFLUXDB_DATABASE", "twitch"),
            ("INFLUXDB_USERNAME", "admin"),
            ("INFLUXDB_PASSWORD", "changeme"),
        ]);
        let config = AppConfig::from_lookup(env(&vars)).unwrap();
        let metrics = config.metrics.unwrap();
        assert_eq!(metrics.address, "http://10.0.0.5:8086");
        assert_eq!(metrics.database, "twitch");

        let settings = metrics.to_influx_settings();
        assert_eq!(settings.username.as_deref(), Some("admin"));
        assert_eq!(settings.password.as_deref(), Some("changeme"));

        vars.push(("INFLUXDB_PORT_8086_TCP_PORT", "not-a-port"));
        assert!(AppConfig::from_lookup(env(&vars)).is_err());
    }

    #[test]
    fn test_redacted_yaml_hides_secrets() {
        let yaml = valid_config().to_redacted_yaml().unwrap();
        for secret in ["abc123", "hunter2", "changeme", "video-client"] {
            assert!(!yaml.contains(secret), "{secret} leaked");
        }
        assert!(yaml.contains("twitch-events"));
        assert!(yaml.contains("producer"));
        assert!(yaml.contains(REDACTED));

        // The redacted copy still parses.
        let parsed: AppConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.twitch.timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_sink_settings() {
        let settings = valid_config().publisher.to_sink_settings();
        assert_eq!(settings.endpoint, "https://pubsub.example.com");
        assert_eq!(settings.reconnect_backoff, DEFAULT_RECONNECT_BACKOFF);
        assert_eq!(settings.timeout, DEFAULT_PUBLISH_TIMEOUT);
    }
}
