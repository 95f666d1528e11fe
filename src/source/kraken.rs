//! Shared HTTP client for the Kraken v5 API.

use std::time::Duration;

use reqwest::Client;
use reqwest::header::ACCEPT;

use crate::collector::{CollectorError, Fetched, SourceConfig};

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.twitch.tv/kraken";

/// Media type selecting the v5 API.
const KRAKEN_V5_ACCEPT: &str = "application/vnd.twitchtv.v5+json";

/// Header carrying the client id.
const CLIENT_ID_HEADER: &str = "Client-ID";

/// Cloneable Kraken client; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct KrakenClient {
    client: Client,
}

impl KrakenClient {
    /// # Errors
    /// Returns `CollectorError::Config` if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, CollectorError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CollectorError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Issue a single GET against the source's endpoint.
    pub async fn get(&self, config: &SourceConfig) -> Result<Fetched, CollectorError> {
        let response = self
            .client
            .get(&config.url)
            .header(ACCEPT, KRAKEN_V5_ACCEPT)
            .header(CLIENT_ID_HEADER, &config.token)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        Ok(Fetched { status, body })
    }
}
