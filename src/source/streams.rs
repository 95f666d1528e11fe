//! Live streams listing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::collector::{CollectorError, Fetched, Source, SourceConfig};
use crate::event::NormalizedEvent;
use crate::source::{KrakenClient, nullable};
use crate::telemetry::MeasurementPoint;

/// Series for per-stream summaries.
pub const STREAMS_SERIES: &str = "streams_collector";

/// A live stream from `/streams`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stream {
    #[serde(rename = "_id")]
    pub id: i64,
    pub average_fps: f64,
    pub channel: StreamChannel,
    pub created_at: String,
    pub delay: i64,
    #[serde(deserialize_with = "nullable")]
    pub game: String,
    pub is_playlist: bool,
    pub preview: BTreeMap<String, String>,
    pub video_height: i64,
    pub viewers: i64,
}

/// Channel broadcasting a [`Stream`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamChannel {
    #[serde(rename = "_id")]
    pub id: i64,
    #[serde(deserialize_with = "nullable")]
    pub broadcaster_language: String,
    pub created_at: String,
    pub display_name: String,
    pub followers: i64,
    #[serde(deserialize_with = "nullable")]
    pub game: String,
    #[serde(deserialize_with = "nullable")]
    pub language: String,
    #[serde(deserialize_with = "nullable")]
    pub logo: String,
    pub mature: bool,
    pub name: String,
    pub partner: bool,
    #[serde(deserialize_with = "nullable")]
    pub profile_banner: String,
    #[serde(deserialize_with = "nullable")]
    pub status: String,
    pub updated_at: String,
    pub url: String,
    #[serde(deserialize_with = "nullable")]
    pub video_banner: String,
    pub views: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StreamsResponse {
    streams: Vec<Stream>,
}

/// Polls the live streams listing.
#[derive(Debug, Clone)]
pub struct StreamsSource {
    config: SourceConfig,
    client: KrakenClient,
}

impl StreamsSource {
    pub fn new(config: SourceConfig, client: KrakenClient) -> Self {
        Self { config, client }
    }
}

#[async_trait::async_trait]
impl Source for StreamsSource {
    type Record = Stream;

    fn config(&self) -> &SourceConfig {
        &self.config
    }

    async fn fetch(&self) -> Result<Fetched, CollectorError> {
        self.client.get(&self.config).await
    }

    fn decode(&self, body: &[u8]) -> Result<Vec<Stream>, CollectorError> {
        let response: StreamsResponse = serde_json::from_slice(body)?;
        Ok(response.streams)
    }

    fn normalize(&self, record: Stream) -> NormalizedEvent {
        NormalizedEvent::new(record)
    }

    fn summarize(&self, stream: &Stream) -> Option<MeasurementPoint> {
        Some(
            MeasurementPoint::new(STREAMS_SERIES)
                .with_tag("game", stream.game.as_str())
                .with_tag("language", stream.channel.language.as_str())
                .with_tag("channel_id", stream.channel.id.to_string())
                .with_field("created_at", stream.created_at.as_str())
                .with_field("name", stream.channel.name.as_str())
                .with_field("status", stream.channel.status.as_str())
                .with_field("viewers", stream.viewers)
                .with_field("channel_views", stream.channel.views),
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
    fn test_decode_and_summarize_streams() {
        let body = r#"{
            "_total": 25000,
            "streams": [
                {
                    "_id": 23932774784,
                    "average_fps": 60,
                    "channel": {
                        "_id": 7236692,
                        "broadcaster_language": "en",
                        "display_name": "dansgaming",
                        "followers": 491875,
                        "game": "Final Fantasy XV",
                        "language": "en",
                        "logo": null,
                        "mature": false,
                        "name": "dansgaming",
                        "partner": true,
                        "status": "Finishing the main story",
                        "video_banner": null,
                        "views": 80621063
                    },
                    "created_at": "2016-12-08T19:45:29Z",
                    "game": "Final Fantasy XV",
                    "preview": {"small": "s.jpg"},
                    "video_height": 720,
                    "viewers": 5403
                }
            ]
        }"#;
        let config = SourceConfig::new(
            EventKind::Stream,
            "http://localhost/streams",
            "token",
            Duration::from_secs(300),
        );
        let source = StreamsSource::new(config, KrakenClient::new(Duration::from_secs(1)).unwrap());

        let streams = source.decode(body.as_bytes()).unwrap();
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].id, 23932774784);
        assert_eq!(streams[0].channel.logo, "");

        let point = source.summarize(&streams[0]).unwrap();
        assert_eq!(point.series, STREAMS_SERIES);
        assert_eq!(point.tags["channel_id"], "7236692");
        assert_eq!(point.tags["language"], "en");
        assert_eq!(point.fields["viewers"], FieldValue::Int(5403));
        assert_eq!(point.fields["channel_views"], FieldValue::Int(80621063));
        assert_eq!(
            point.fields["status"],
            FieldValue::Str("Finishing the main story".to_string())
        );
    }
}
