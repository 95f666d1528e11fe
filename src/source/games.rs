//! Top games listing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::collector::{CollectorError, Fetched, Source, SourceConfig};
use crate::event::NormalizedEvent;
use crate::source::{KrakenClient, nullable};
use crate::telemetry::MeasurementPoint;

/// Series for per-game summaries.
pub const GAMES_SERIES: &str = "games_collector";

/// An entry of `/games/top`: a game with its live audience.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopGame {
    pub channels: i64,
    pub viewers: i64,
    pub game: Game,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Game {
    #[serde(rename = "_id")]
    pub id: i64,
    #[serde(rename = "box")]
    pub box_art: BTreeMap<String, String>,
    #[serde(deserialize_with = "nullable")]
    pub giantbomb_id: i64,
    pub logo: BTreeMap<String, String>,
    pub name: String,
    pub popularity: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GamesResponse {
    #[serde(rename = "_total")]
    #[allow(dead_code)]
    total: i64,
    top: Vec<TopGame>,
}

/// Polls the top games listing.
#[derive(Debug, Clone)]
pub struct GamesSource {
    config: SourceConfig,
    client: KrakenClient,
}

impl GamesSource {
    pub fn new(config: SourceConfig, client: KrakenClient) -> Self {
        Self { config, client }
    }
}

#[async_trait::async_trait]
impl Source for GamesSource {
    type Record = TopGame;

    fn config(&self) -> &SourceConfig {
        &self.config
    }

    async fn fetch(&self) -> Result<Fetched, CollectorError> {
        self.client.get(&self.config).await
    }

    fn decode(&self, body: &[u8]) -> Result<Vec<TopGame>, CollectorError> {
        let response: GamesResponse = serde_json::from_slice(body)?;
        Ok(response.top)
    }

    fn normalize(&self, record: TopGame) -> NormalizedEvent {
        NormalizedEvent::new(record)
    }

    fn summarize(&self, entry: &TopGame) -> Option<MeasurementPoint> {
        Some(
            MeasurementPoint::new(GAMES_SERIES)
                .with_tag("name", entry.game.name.as_str())
                .with_field("popularity", entry.game.popularity)
                .with_field("viewers", entry.viewers),
        )
    }
}
