//! Top videos listing.

use serde::{Deserialize, Serialize};

use crate::collector::{CollectorError, Fetched, Source, SourceConfig};
use crate::event::NormalizedEvent;
use crate::source::{KrakenClient, nullable};
use crate::telemetry::MeasurementPoint;

/// Series for per-video summaries.
pub const VIDEOS_SERIES: &str = "videos_collector";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Video {
    #[serde(rename = "_id")]
    pub id: String,
    pub broadcast_id: i64,
    pub broadcast_type: String,
    pub channel: VideoChannel,
    pub created_at: String,
    #[serde(deserialize_with = "nullable")]
    pub description: String,
    #[serde(deserialize_with = "nullable")]
    pub description_html: String,
    #[serde(deserialize_with = "nullable")]
    pub game: String,
    #[serde(deserialize_with = "nullable")]
    pub language: String,
    pub length: i64,
    pub published_at: String,
    #[serde(deserialize_with = "nullable")]
    pub status: String,
    #[serde(deserialize_with = "nullable")]
    pub tag_list: String,
    #[serde(deserialize_with = "nullable")]
    pub title: String,
    pub url: String,
    pub viewable: String,
    pub views: i64,
}

/// Channel that owns a [`Video`].
///
/// The id arrives as either a number or a string, so it is kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoChannel {
    #[serde(rename = "_id")]
    pub id: serde_json::Value,
    pub display_name: String,
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VideosResponse {
    vods: Vec<Video>,
}

/// Polls the top videos of the month.
#[derive(Debug, Clone)]
pub struct VideosSource {
    config: SourceConfig,
    client: KrakenClient,
}

impl VideosSource {
    pub fn new(config: SourceConfig, client: KrakenClient) -> Self {
        Self { config, client }
    }
}

#[async_trait::async_trait]
impl Source for VideosSource {
    type Record = Video;

    fn config(&self) -> &SourceConfig {
        &self.config
    }

    async fn fetch(&self) -> Result<Fetched, CollectorError> {
        self.client.get(&self.config).await
    }

    fn decode(&self, body: &[u8]) -> Result<Vec<Video>, CollectorError> {
        let response: VideosResponse = serde_json::from_slice(body)?;
        Ok(response.vods)
    }

    fn normalize(&self, record: Video) -> NormalizedEvent {
        NormalizedEvent::new(record)
    }

    fn summarize(&self, video: &Video) -> Option<MeasurementPoint> {
        Some(
            MeasurementPoint::new(VIDEOS_SERIES)
                .with_tag("game", video.game.as_str())
                .with_tag("language", video.language.as_str())
                .with_field("views", video.views)
                .with_field("title", video.title.as_str())
                .with_field("status", video.status.as_str()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use crate::telemetry::FieldValue;
    use std::time::Duration;

    #[test]
    fn test_decode_and_summarize_videos() {
        let body = r#"{
            "vods": [
                {
                    "_id": "v106400740",
                    "broadcast_id": 24592386080,
                    "broadcast_type": "highlight",
                    "channel": {"_id": "12826", "display_name": "Twitch", "name": "twitch"},
                    "description": null,
                    "game": "Creative",
                    "language": "en",
                    "length": 3476,
                    "status": "recorded",
                    "title": "Studio Session",
                    "views": 101
                },
                {
                    "_id": "v2",
                    "channel": {"_id": 42, "name": "other"},
                    "game": null
                }
            ]
        }"#;
        let config = SourceConfig::new(
            EventKind::Video,
            "http://localhost/videos/top",
            "token",
            Duration::from_secs(300),
        );
        let source = VideosSource::new(config, KrakenClient::new(Duration::from_secs(1)).unwrap());

        let videos = source.decode(body.as_bytes()).unwrap();
        assert_eq!(videos.len(), 2);
        assert_eq!(videos[0].channel.id, serde_json::json!("12826"));
        assert_eq!(videos[1].channel.id, serde_json::json!(42));
        assert_eq!(videos[1].game, "");

        let point = source.summarize(&videos[0]).unwrap();
        assert_eq!(point.series, VIDEOS_SERIES);
        assert_eq!(point.tags["game"], "Creative");
        assert_eq!(point.fields["views"], FieldValue::Int(101));
        assert_eq!(point.fields["title"], FieldValue::Str("Studio Session".to_string()));
    }
}
