//! Publisher Layer
//!
//! The single consumer of the event bus. Events are forwarded to an
//! [`EventSink`] while it reports a live connection and silently dropped
//! while it does not.
//!
//! # Components
//!
//! - [`EventSink`]: outbound pub/sub connection
//! - [`HttpEventSink`] / [`HttpSinkSettings`]: HTTP pub/sub endpoint
//! - [`Publisher`]: egress loop returning [`PublishStats`] once stopped

mod error;
mod sink;
mod worker;

pub use error::PublishError;
pub use sink::{
    APP_KEY_HEADER, DEFAULT_PUBLISH_TIMEOUT, DEFAULT_RECONNECT_BACKOFF, EventSink, HttpEventSink,
    HttpSinkSettings,
};
pub use worker::{PublishStats, Publisher};
