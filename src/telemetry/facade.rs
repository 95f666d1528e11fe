//! User-facing telemetry handle.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc::{self, error::TrySendError};

use crate::telemetry::TelemetryError;
use crate::telemetry::point::MeasurementPoint;

/// Non-blocking point recorder shared by every emitter.
///
/// Uses `try_send`: a point is dropped (and counted) when the channel is
/// full, so recording never stalls a collector. A disabled handle records
/// nothing and never builds a point.
#[derive(Clone, Default)]
pub struct Telemetry {
    inner: Option<Arc<Inner>>,
}

struct Inner {
    tx: mpsc::Sender<MeasurementPoint>,
    dropped: AtomicU64,
}

impl std::fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Telemetry")
            .field("enabled", &self.is_enabled())
            .finish_non_exhaustive()
    }
}

impl Telemetry {
    pub(crate) fn new(tx: mpsc::Sender<MeasurementPoint>) -> Self {
        Self {
            inner: Some(Arc::new(Inner {
                tx,
                dropped: AtomicU64::new(0),
            })),
        }
    }

    /// A handle that discards everything.
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Enqueue a point for the next batch.
    ///
    /// Recording on a disabled handle is a successful no-op.
    pub fn record(&self, point: MeasurementPoint) -> Result<(), TelemetryError> {
        let Some(inner) = &self.inner else {
            return Ok(());
        };
        match inner.tx.try_send(point) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(point)) => {
                tracing::warn!(series = %point.series, "Point channel full, dropping point");
                inner.dropped.fetch_add(1, Ordering::Relaxed);
                Err(TelemetryError::ChannelSend)
            }
            Err(TrySendError::Closed(_)) => {
                inner.dropped.fetch_add(1, Ordering::Relaxed);
                Err(TelemetryError::ChannelSend)
            }
        }
    }

    /// Build and enqueue a point only when telemetry is enabled.
    ///
    /// `build` may return `None` to skip recording.
    pub fn record_with<P>(&self, build: impl FnOnce() -> P)
    where
        P: Into<Option<MeasurementPoint>>,
    {
        if !self.is_enabled() {
            return;
        }
        if let Some(point) = build().into() {
            // Drops are already counted and logged by `record`.
            let _ = self.record(point);
        }
    }

    /// Number of points waiting in the channel.
    pub fn queue_depth(&self) -> usize {
        self.inner
            .as_ref()
            .map(|i| i.tx.max_capacity() - i.tx.capacity())
            .unwrap_or(0)
    }

    /// Total points dropped because the channel was full or closed.
    pub fn dropped_points(&self) -> u64 {
        self.inner
            .as_ref()
            .map(|i| i.dropped.load(Ordering::Relaxed))
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_never_builds_points() {
        let telemetry = Telemetry::disabled();
        let mut built = false;
        telemetry.record_with(|| {
            built = true;
            MeasurementPoint::new("never")
        });
        assert!(!built);
        assert!(!telemetry.is_enabled());
        assert!(telemetry.record(MeasurementPoint::new("x")).is_ok());
        assert_eq!(telemetry.queue_depth(), 0);
    }

    #[test]
    fn test_builder_returning_none_records_nothing() {
        let (tx, mut rx) = mpsc::channel(4);
        let telemetry = Telemetry::new(tx);

        telemetry.record_with(|| None::<MeasurementPoint>);
        telemetry.record_with(|| Some(MeasurementPoint::new("kept").with_field("v", 1i64)));

        assert_eq!(telemetry.queue_depth(), 1);
        assert_eq!(rx.try_recv().unwrap().series, "kept");
        assert_eq!(telemetry.dropped_points(), 0);
    }

    #[test]
    fn test_full_channel_drops_and_counts() {
        let (tx, _rx) = mpsc::channel(2);
        let telemetry = Telemetry::new(tx);

        telemetry.record_with(|| MeasurementPoint::new("a").with_field("v", 1i64));
        telemetry.record_with(|| MeasurementPoint::new("b").with_field("v", 2i64));
        assert_eq!(telemetry.queue_depth(), 2);

        let err = telemetry
            .record(MeasurementPoint::new("c").with_field("v", 3i64))
            .unwrap_err();
        assert!(matches!(err, TelemetryError::ChannelSend));
        assert_eq!(telemetry.dropped_points(), 1);
    }
}
