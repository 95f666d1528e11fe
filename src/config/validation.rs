//! Configuration validation utilities.

use std::sync::OnceLock;

use regex::{Captures, Regex};
use thiserror::Error;

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse YAML configuration.
    #[error("failed to parse YAML config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// Configuration validation failed.
    #[error("config validation error: {0}")]
    ValidationError(String),

    /// A required environment variable is unset or empty.
    #[error("missing required environment variable {0}")]
    MissingEnv(&'static str),
}

/// Expand `${VAR}` and `${VAR:-default}` references from the process
/// environment.
pub fn expand_env_vars(input: &str) -> String {
    expand_vars_with(input, |name| std::env::var(name).ok())
}

/// Expand variable references using `lookup`.
///
/// Unset variables without a default expand to the empty string, so a
/// missing secret surfaces later as a validation error on its field.
pub fn expand_vars_with<F>(input: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    static VAR_REF: OnceLock<Option<Regex>> = OnceLock::new();

    let Some(pattern) = VAR_REF
        .get_or_init(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}").ok())
        .as_ref()
    else {
        return input.to_string();
    };

    pattern
        .replace_all(input, |caps: &Captures| {
            lookup(&caps[1])
                .unwrap_or_else(|| caps.get(2).map_or_else(String::new, |m| m.as_str().to_string()))
        })
        .into_owned()
}
