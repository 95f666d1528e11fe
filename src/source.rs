//! Upstream Sources
//!
//! The four Twitch Kraken v5 listings polled by the relay. Each module holds
//! the record shape of its listing and a [`Source`](crate::collector::Source)
//! implementation:
//!
//! - [`ClipsSource`]: top clips
//! - [`GamesSource`]: top games
//! - [`StreamsSource`]: live streams
//! - [`VideosSource`]: top videos of the month
//!
//! All of them share one [`KrakenClient`].

use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::event::EventKind;

mod clips;
mod games;
mod kraken;
mod streams;
mod videos;

pub use clips::{Clip, ClipsSource};
pub use games::{Game, GamesSource, TopGame};
pub use kraken::{DEFAULT_BASE_URL, KrakenClient};
pub use streams::{Stream, StreamChannel, StreamsSource};
pub use videos::{Video, VideoChannel, VideosSource};

/// Listing path below the API base URL.
pub fn endpoint_path(kind: EventKind) -> &'static str {
    match kind {
        EventKind::Clip => "/clips/top?limit=100",
        EventKind::Game => "/games/top?limit=100",
        EventKind::Stream => "/streams?limit=100",
        EventKind::Video => "/videos/top?period=month&limit=100&sort=views",
    }
}

/// Default poll interval per listing.
pub fn default_interval(kind: EventKind) -> Duration {
    match kind {
        EventKind::Clip => Duration::from_secs(120),
        EventKind::Game | EventKind::Stream | EventKind::Video => Duration::from_secs(300),
    }
}

/// Join a base URL and a listing path.
pub fn endpoint_url(base_url: &str, kind: EventKind) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), endpoint_path(kind))
}

/// Deserialize `null` as the type's default, like a missing field.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
