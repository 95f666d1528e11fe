//! Top clips listing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::collector::{CollectorError, Fetched, Source, SourceConfig};
use crate::event::NormalizedEvent;
use crate::source::{KrakenClient, nullable};
use crate::telemetry::MeasurementPoint;

/// Series for per-clip summaries.
pub const CLIPS_SERIES: &str = "clips_collector";

/// A clip from `/clips/top`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Clip {
    pub slug: String,
    pub tracking_id: String,
    pub url: String,
    pub embed_url: String,
    pub embed_html: String,
    pub broadcaster: BTreeMap<String, serde_json::Value>,
    pub curator: BTreeMap<String, serde_json::Value>,
    pub vod: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(deserialize_with = "nullable")]
    pub game: String,
    #[serde(deserialize_with = "nullable")]
    pub language: String,
    pub title: String,
    pub views: f64,
    pub duration: f64,
    pub created_at: String,
    pub thumbnails: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ClipsResponse {
    clips: Vec<Clip>,
    #[allow(dead_code)]
    cursor: String,
}

/// Polls the top clips listing.
#[derive(Debug, Clone)]
pub struct ClipsSource {
    config: SourceConfig,
    client: KrakenClient,
}

impl ClipsSource {
    pub fn new(config: SourceConfig, client: KrakenClient) -> Self {
        Self { config, client }
    }
}

#[async_trait::async_trait]
impl Source for ClipsSource {
    type Record = Clip;

    fn config(&self) -> &SourceConfig {
        &self.config
    }

    async fn fetch(&self) -> Result<Fetched, CollectorError> {
        self.client.get(&self.config).await
    }

    fn decode(&self, body: &[u8]) -> Result<Vec<Clip>, CollectorError> {
        let response: ClipsResponse = serde_json::from_slice(body)?;
        Ok(response.clips)
    }

    fn normalize(&self, record: Clip) -> NormalizedEvent {
        NormalizedEvent::new(record)
    }

    fn summarize(&self, clip: &Clip) -> Option<MeasurementPoint> {
        Some(
            MeasurementPoint::new(CLIPS_SERIES)
                .with_tag("clip_title", clip.title.as_str())
                .with_tag("clip_game", clip.game.as_str())
                .with_field("tracking_id", clip.tracking_id.as_str())
                .with_field("language", clip.language.as_str())
                .with_field("created_at", clip.created_at.as_str())
                .with_field("views", clip.views),
        )
    }
}
