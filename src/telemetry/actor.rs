//! Batch actor: the single owner of the current batch.
//!
//! Points arrive over the MPSC channel and are appended to the batch. On each
//! flush tick the batch is swapped for an empty one and the swapped-out batch
//! is transmitted on its own task, so appends keep flowing while a write is
//! in flight. Failed writes are logged and the batch is discarded.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::Receiver;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;

use crate::telemetry::point::{Batch, MeasurementPoint};
use crate::telemetry::sink::MetricsSink;

/// Default flush period (30 seconds).
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(30);

pub(crate) struct BatchActor {
    rx: Receiver<MeasurementPoint>,
    sink: Arc<dyn MetricsSink>,
    batch: Batch,
    flush_interval: Duration,
    stop: CancellationToken,
    in_flight: JoinSet<()>,
}

impl BatchActor {
    pub(crate) fn new(
        rx: Receiver<MeasurementPoint>,
        sink: Arc<dyn MetricsSink>,
        flush_interval: Duration,
        stop: CancellationToken,
    ) -> Self {
        Self {
            rx,
            sink,
            batch: Batch::new(),
            flush_interval,
            stop,
            in_flight: JoinSet::new(),
        }
    }

    pub(crate) async fn run(mut self) {
        tracing::info!(flush_interval = ?self.flush_interval, "Telemetry batcher started");

        let mut ticker = interval_at(Instant::now() + self.flush_interval, self.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.stop.cancelled() => break,
                _ = ticker.tick() => self.flush(),
                point = self.rx.recv() => match point {
                    Some(point) => self.batch.push(point),
                    None => {
                        tracing::debug!("Point channel closed");
                        break;
                    }
                },
                Some(joined) = self.in_flight.join_next(), if !self.in_flight.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!(error = %e, "Batch write task failed");
                    }
                }
            }
        }

        // Points enqueued before the stop still belong to a batch.
        while let Ok(point) = self.rx.try_recv() {
            self.batch.push(point);
        }
        self.flush();
        while let Some(joined) = self.in_flight.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Batch write task failed");
            }
        }

        tracing::info!("Telemetry batcher stopped");
    }

    fn flush(&mut self) {
        if self.batch.is_empty() {
            return;
        }
        let batch = std::mem::take(&mut self.batch);
        let sink = Arc::clone(&self.sink);
        self.in_flight.spawn(async move {
            tracing::debug!(count = batch.len(), "Writing points batch");
            if let Err(e) = sink.write(&batch).await {
                tracing::warn!(error = %e, count = batch.len(), "Batch write failed, discarding");
            }
        });
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::telemetry::TelemetryError;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    /// Sink that records every batch it receives.
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub(crate) batches: Mutex<Vec<Vec<MeasurementPoint>>>,
        pub(crate) fail: bool,
    }

    impl RecordingSink {
        pub(crate) fn series(&self) -> Vec<Vec<String>> {
            self.batches
                .lock()
                .unwrap()
                .iter()
                .map(|b| b.iter().map(|p| p.series.clone()).collect())
                .collect()
        }
    }

    #[async_trait::async_trait]
    impl MetricsSink for RecordingSink {
        async fn write(&self, batch: &Batch) -> Result<(), TelemetryError> {
            self.batches.lock().unwrap().push(batch.points().to_vec());
            if self.fail {
                return Err(TelemetryError::Internal("sink down".to_string()));
            }
            Ok(())
        }
    }

    fn point(series: &str) -> MeasurementPoint {
        MeasurementPoint::new(series).with_field("v", 1i64)
    }

    #[tokio::test(start_paused = true)]
    async fn test_points_land_in_exactly_one_batch() {
        let (tx, rx) = mpsc::channel(16);
        let sink = Arc::new(RecordingSink::default());
        let stop = CancellationToken::new();
        let handle = tokio::spawn(
            BatchActor::new(rx, sink.clone(), Duration::from_secs(30), stop.clone()).run(),
        );

        tx.send(point("a")).await.unwrap();
        tx.send(point("b")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(31)).await;

        tx.send(point("c")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;

        // Idle window: nothing to send.
        tokio::time::sleep(Duration::from_secs(30)).await;

        tx.send(point("d")).await.unwrap();
        stop.cancel();
        handle.await.unwrap();

        assert_eq!(
            sink.series(),
            vec![
                vec!["a".to_string(), "b".to_string()],
                vec!["c".to_string()],
                vec!["d".to_string()],
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_batch_is_discarded() {
        let (tx, rx) = mpsc::channel(16);
        let sink = Arc::new(RecordingSink {
            fail: true,
            ..Default::default()
        });
        let stop = CancellationToken::new();
        let handle = tokio::spawn(
            BatchActor::new(rx, sink.clone(), Duration::from_secs(30), stop.clone()).run(),
        );

        tx.send(point("a")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(31)).await;
        tx.send(point("b")).await.unwrap();
        stop.cancel();
        handle.await.unwrap();

        // No retry: "a" is never resent with "b".
        assert_eq!(
            sink.series(),
            vec![vec!["a".to_string()], vec!["b".to_string()]]
        );
    }

    #[tokio::test]
    async fn test_closed_channel_flushes_and_exits() {
        let (tx, rx) = mpsc::channel(16);
        let sink = Arc::new(RecordingSink::default());
        let handle = tokio::spawn(
            BatchActor::new(
                rx,
                sink.clone(),
                Duration::from_secs(3600),
                CancellationToken::new(),
            )
            .run(),
        );

        tx.send(point("only")).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        assert_eq!(sink.series(), vec![vec!["only".to_string()]]);
    }
}
