//! Configuration module for the relay.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Twitch settings (base URL, client id, per-source intervals)
//! - Publisher settings (endpoint, channel, credential triple)
//! - Metrics settings (InfluxDB address, database, batching)
//!
//! When no configuration file exists the same settings are read from the
//! process environment.

mod app;
mod validation;

pub use app::{
    AppConfig, EnvVars, MetricsConfig, PublisherConfig, REDACTED, SourceSettings, SourcesConfig,
    TwitchConfig,
};
pub use validation::{ConfigError, expand_env_vars, expand_vars_with};

// Re-export constants
pub use app::{DEFAULT_INFLUX_PORT, DEFAULT_REQUEST_TIMEOUT, ENV_VARS};
