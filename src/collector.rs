//! Collector Layer
//!
//! One poll loop per upstream source. Each collector runs in its own Tokio
//! task, fetches its endpoint on a fixed interval and hands every decoded
//! record to the event bus, in upstream order.
//!
//! # Architecture
//!
//! - [`Source`]: what a listing knows (fetch, decode, normalize, summarize)
//! - [`Collector`]: the shared loop driving a [`Source`]
//! - [`SourceConfig`]: name, endpoint, token, interval and timeout
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use twitch_relay::collector::{Collector, SourceConfig};
//! use twitch_relay::event::{EventKind, event_bus};
//! use twitch_relay::source::{ClipsSource, KrakenClient};
//! use twitch_relay::telemetry::Telemetry;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = KrakenClient::new(Duration::from_secs(10))?;
//! let config = SourceConfig::new(
//!     EventKind::Clip,
//!     "https://api.twitch.tv/kraken/clips/top?limit=100",
//!     "client-id",
//!     Duration::from_secs(120),
//! );
//! let (events, _rx) = event_bus();
//! let collector = Collector::new(ClipsSource::new(config, client), events, Telemetry::disabled());
//! // coordinator.spawn_collector(collector);
//! # Ok(())
//! # }
//! ```

mod runner;
mod traits;

pub use runner::{CYCLE_SERIES, Collector, CycleOutcome};
pub use traits::{CollectorError, DEFAULT_TIMEOUT, Fetched, MIN_INTERVAL, Source, SourceConfig};
