//! Twitch Relay - Event Pipeline Library
//!
//! Polls the Twitch Kraken listings, forwards every record as an
//! `{event_name, data}` envelope to a pub/sub channel and, optionally,
//! reports pipeline measurements to InfluxDB. Run it as a standalone binary
//! with the `twitch-relay` executable or embed the pieces in another service.
//!
//! # Architecture
//!
//! - **Collectors**: one poll loop per listing, feeding the event bus
//! - **Event bus**: bounded MPSC channel with a single consumer
//! - **Publisher**: drains the bus into the outbound sink
//! - **Telemetry**: batched InfluxDB line-protocol writes
//! - **Shutdown**: ordered stop of collectors, then publisher, then telemetry
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use twitch_relay::collector::{Collector, SourceConfig};
//! use twitch_relay::event::{EventKind, event_bus};
//! use twitch_relay::publisher::{HttpEventSink, HttpSinkSettings, Publisher};
//! use twitch_relay::shutdown::{ShutdownCoordinator, shutdown_signal};
//! use twitch_relay::source::{GamesSource, KrakenClient, endpoint_url, DEFAULT_BASE_URL};
//! use twitch_relay::telemetry::Telemetry;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (events, rx) = event_bus();
//!     let sink = HttpEventSink::new(HttpSinkSettings::new(
//!         "https://pubsub.example.com", "twitch", "app-key", "role", "secret",
//!     ))?;
//!     let publisher = Publisher::connect(sink, rx).await?;
//!
//!     let client = KrakenClient::new(Duration::from_secs(10))?;
//!     let config = SourceConfig::new(
//!         EventKind::Game,
//!         endpoint_url(DEFAULT_BASE_URL, EventKind::Game),
//!         "client-id",
//!         Duration::from_secs(300),
//!     );
//!     let games = Collector::new(GamesSource::new(config, client), events, Telemetry::disabled());
//!
//!     let mut coordinator = ShutdownCoordinator::new();
//!     coordinator.spawn_collector(games);
//!     coordinator.spawn_publisher(publisher);
//!     coordinator.run_until(shutdown_signal()).await;
//!     Ok(())
//! }
//! ```

pub mod collector;
pub mod config;
pub mod event;
pub mod publisher;
pub mod shutdown;
pub mod source;
pub mod telemetry;

pub use collector::{Collector, CollectorError, Source, SourceConfig};
pub use config::{AppConfig, ConfigError};
pub use event::{EventKind, EventPayload, NormalizedEvent, event_bus};
pub use publisher::{EventSink, HttpEventSink, PublishError, PublishStats, Publisher};
pub use shutdown::{ShutdownCoordinator, ShutdownReport, ShutdownState, StopFlag};
pub use telemetry::{MeasurementPoint, Telemetry, TelemetryBuilder, TelemetryError};
