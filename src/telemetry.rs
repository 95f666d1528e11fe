//! Telemetry Layer
//!
//! Side-channel measurements for dashboards, batched and flushed on a fixed
//! period to a metrics sink:
//! - **Recorder**: [`Telemetry`] handles enqueue points without blocking
//! - **Batcher**: one actor task owns the current [`Batch`] and swaps it out on every flush tick
//! - **Sampler**: a second task records the point channel depth
//!
//! When metrics are disabled every emitter holds [`Telemetry::disabled`] and
//! nothing is ever built or sent.

mod actor;
mod builder;
mod error;
mod facade;
mod point;
mod sampler;
mod sink;

pub use actor::DEFAULT_FLUSH_INTERVAL;
pub use builder::{DEFAULT_CHANNEL_CAPACITY, TelemetryBuilder, TelemetryHandles};
pub use error::TelemetryError;
pub use facade::Telemetry;
pub use point::{Batch, FieldValue, MeasurementPoint};
pub use sampler::{CHANNEL_SERIES, DEFAULT_SAMPLE_INTERVAL};
pub use sink::{InfluxSettings, InfluxSink, MetricsSink};
