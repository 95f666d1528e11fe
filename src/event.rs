//! Normalized event envelope and the event bus.
//!
//! Every record decoded by a collector is wrapped in a [`NormalizedEvent`]
//! before it is handed to the publisher. The envelope serializes as
//! `{"event_name": "<kind>", "data": <record>}`.

use serde::ser::{Serialize, SerializeStruct, Serializer};
use strum_macros::{AsRefStr, Display, EnumString};
use tokio::sync::mpsc;

use crate::source::{Clip, Stream, TopGame, Video};

/// Capacity of the event bus.
///
/// Tokio channels need at least one slot, so a single slot is the closest
/// thing to a rendezvous hand-off: a second send waits for the publisher.
pub const EVENT_BUS_CAPACITY: usize = 1;

/// Kind of upstream record carried by an event.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    serde::Serialize,
    serde::Deserialize,
    EnumString,
    Display,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum EventKind {
    Clip,
    Game,
    Stream,
    Video,
}

impl EventKind {
    /// All kinds, in collector start order.
    pub const ALL: [EventKind; 4] = [Self::Clip, Self::Game, Self::Stream, Self::Video];
}

/// Decoded upstream record.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    Clip(Clip),
    Game(TopGame),
    Stream(Stream),
    Video(Video),
}

impl EventPayload {
    /// Kind of the wrapped record.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Clip(_) => EventKind::Clip,
            Self::Game(_) => EventKind::Game,
            Self::Stream(_) => EventKind::Stream,
            Self::Video(_) => EventKind::Video,
        }
    }
}

impl Serialize for EventPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Clip(r) => r.serialize(serializer),
            Self::Game(r) => r.serialize(serializer),
            Self::Stream(r) => r.serialize(serializer),
            Self::Video(r) => r.serialize(serializer),
        }
    }
}

/// A single upstream record tagged with its kind.
///
/// Immutable once built. The kind is derived from the payload variant so the
/// two can never disagree.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedEvent {
    payload: EventPayload,
}

impl NormalizedEvent {
    pub fn new(payload: impl Into<EventPayload>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    pub fn into_payload(self) -> EventPayload {
        self.payload
    }

    /// Serialize the outbound envelope.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl Serialize for NormalizedEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut envelope = serializer.serialize_struct("NormalizedEvent", 2)?;
        envelope.serialize_field("event_name", &self.kind())?;
        envelope.serialize_field("data", &self.payload)?;
        envelope.end()
    }
}

impl From<Clip> for EventPayload {
    fn from(r: Clip) -> Self {
        Self::Clip(r)
    }
}

impl From<TopGame> for EventPayload {
    fn from(r: TopGame) -> Self {
        Self::Game(r)
    }
}

impl From<Stream> for EventPayload {
    fn from(r: Stream) -> Self {
        Self::Stream(r)
    }
}

impl From<Video> for EventPayload {
    fn from(r: Video) -> Self {
        Self::Video(r)
    }
}

/// Sending half of the event bus, cloned into every collector.
pub type EventSender = mpsc::Sender<NormalizedEvent>;

/// Receiving half of the event bus, owned by the publisher.
pub type EventReceiver = mpsc::Receiver<NormalizedEvent>;

/// Create the event bus shared by all collectors and the publisher.
pub fn event_bus() -> (EventSender, EventReceiver) {
    mpsc::channel(EVENT_BUS_CAPACITY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_event_kind_strings() {
        assert_eq!(EventKind::Clip.as_ref(), "clip");
        assert_eq!(EventKind::Video.to_string(), "video");
        assert_eq!(EventKind::from_str("STREAM").unwrap(), EventKind::Stream);
        assert!(EventKind::from_str("channel").is_err());
    }

    #[test]
    fn test_envelope_shape() {
        let game = TopGame {
            channels: 12,
            viewers: 3400,
            ..Default::default()
        };
        let event = NormalizedEvent::new(game.clone());
        assert_eq!(event.kind(), EventKind::Game);

        let json: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(json["event_name"], "game");
        assert_eq!(json["data"]["viewers"], 3400);
        assert_eq!(json["data"]["channels"], 12);
        assert_eq!(json.as_object().unwrap().len(), 2);
        assert_eq!(json["data"], serde_json::to_value(&game).unwrap());
    }

    #[tokio::test]
    async fn test_event_bus_holds_single_event() {
        let (tx, mut rx) = event_bus();
        tx.send(NormalizedEvent::new(Clip::default())).await.unwrap();
        assert!(tx.try_send(NormalizedEvent::new(Clip::default())).is_err());
        assert_eq!(rx.recv().await.unwrap().kind(), EventKind::Clip);
    }
}
