//! Telemetry builder and handles.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::telemetry::actor::{BatchActor, DEFAULT_FLUSH_INTERVAL};
use crate::telemetry::facade::Telemetry;
use crate::telemetry::sampler::{DEFAULT_SAMPLE_INTERVAL, run_depth_sampler};
use crate::telemetry::sink::MetricsSink;
use crate::telemetry::TelemetryError;

/// Default point channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 10_000;

/// Builder for the telemetry pipeline.
pub struct TelemetryBuilder {
    sink: Arc<dyn MetricsSink>,
    channel_capacity: usize,
    flush_interval: Duration,
    sample_interval: Duration,
}

impl TelemetryBuilder {
    pub fn new(sink: impl MetricsSink) -> Self {
        Self::with_shared_sink(Arc::new(sink))
    }

    /// Use a sink the caller keeps a reference to.
    pub fn with_shared_sink(sink: Arc<dyn MetricsSink>) -> Self {
        Self {
            sink,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
        }
    }

    /// Set the point channel capacity.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Set the batch flush period.
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Set the queue depth sampling period.
    pub fn sample_interval(mut self, interval: Duration) -> Self {
        self.sample_interval = interval;
        self
    }

    /// Spawn the batch actor and depth sampler.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn build(self) -> Result<TelemetryHandles, TelemetryError> {
        if self.channel_capacity == 0 {
            return Err(TelemetryError::Config(
                "channel capacity must be positive".to_string(),
            ));
        }
        if self.flush_interval.is_zero() || self.sample_interval.is_zero() {
            return Err(TelemetryError::Config(
                "flush and sample intervals must be non-zero".to_string(),
            ));
        }

        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let telemetry = Telemetry::new(tx);

        let actor_stop = CancellationToken::new();
        let sampler_stop = CancellationToken::new();

        let actor = BatchActor::new(rx, self.sink, self.flush_interval, actor_stop.clone());
        let actor_handle = tokio::spawn(actor.run());
        let sampler_handle = tokio::spawn(run_depth_sampler(
            telemetry.clone(),
            self.sample_interval,
            sampler_stop.clone(),
        ));

        Ok(TelemetryHandles {
            telemetry,
            actor_stop,
            sampler_stop,
            actor_handle: Some(actor_handle),
            sampler_handle: Some(sampler_handle),
        })
    }
}

/// Handles to the running telemetry pipeline.
pub struct TelemetryHandles {
    /// Recorder handle to clone into emitters.
    pub telemetry: Telemetry,
    actor_stop: CancellationToken,
    sampler_stop: CancellationToken,
    actor_handle: Option<JoinHandle<()>>,
    sampler_handle: Option<JoinHandle<()>>,
}

impl TelemetryHandles {
    /// Stop the sampler, flush the current batch and wait for in-flight writes.
    pub async fn shutdown(mut self) -> Result<(), TelemetryError> {
        self.sampler_stop.cancel();
        if let Some(handle) = self.sampler_handle.take() {
            handle
                .await
                .map_err(|e| TelemetryError::Internal(format!("sampler task failed: {e}")))?;
        }

        self.actor_stop.cancel();
        if let Some(handle) = self.actor_handle.take() {
            handle
                .await
                .map_err(|e| TelemetryError::Internal(format!("batch actor task failed: {e}")))?;
        }

        tracing::info!("Telemetry shut down");
        Ok(())
    }
}

impl Drop for TelemetryHandles {
    fn drop(&mut self) {
        // Without an explicit shutdown the tasks still get a stop request.
        self.sampler_stop.cancel();
        self.actor_stop.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::actor::tests::RecordingSink;
    use crate::telemetry::point::MeasurementPoint;
    use crate::telemetry::sampler::CHANNEL_SERIES;

    #[tokio::test(start_paused = true)]
    async fn test_builder_lifecycle() {
        let sink = Arc::new(RecordingSink::default());
        let handles = TelemetryBuilder::with_shared_sink(sink.clone())
            .flush_interval(Duration::from_secs(30))
            .sample_interval(Duration::from_secs(5))
            .build()
            .unwrap();

        handles
            .telemetry
            .record(MeasurementPoint::new("collectors").with_field("records", 3i64))
            .unwrap();
        tokio::time::sleep(Duration::from_secs(12)).await;
        handles.shutdown().await.unwrap();

        let batches = sink.series();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0][0], "collectors");
        assert_eq!(
            batches[0].iter().filter(|s| *s == CHANNEL_SERIES).count(),
            2
        );
    }

    #[tokio::test]
    async fn test_builder_rejects_zero_capacity() {
        let result = TelemetryBuilder::new(RecordingSink::default())
            .channel_capacity(0)
            .build();
        assert!(matches!(result, Err(TelemetryError::Config(_))));
    }
}
