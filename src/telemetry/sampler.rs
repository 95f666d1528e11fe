//! Periodic sampler for the point channel depth.

use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;

use crate::telemetry::facade::Telemetry;
use crate::telemetry::point::MeasurementPoint;

/// Default sampling period (5 seconds).
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_secs(5);

/// Series the depth samples are recorded under.
pub const CHANNEL_SERIES: &str = "internal_channels";

/// Record the point channel depth every `period` until `stop` fires.
pub(crate) async fn run_depth_sampler(
    telemetry: Telemetry,
    period: Duration,
    stop: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {
                telemetry.record_with(|| depth_point(&telemetry));
            }
        }
    }
    tracing::debug!("Queue depth sampler stopped");
}

fn depth_point(telemetry: &Telemetry) -> MeasurementPoint {
    MeasurementPoint::new(CHANNEL_SERIES)
        .with_tag("channel", "points")
        .with_field("channel_len", telemetry.queue_depth())
        .with_field("dropped", telemetry.dropped_points())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::FieldValue;
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn test_sampler_reports_depth() {
        let (tx, mut rx) = mpsc::channel(8);
        let telemetry = Telemetry::new(tx);
        let stop = CancellationToken::new();

        telemetry.record_with(|| MeasurementPoint::new("pending").with_field("v", 1i64));
        let handle = tokio::spawn(run_depth_sampler(
            telemetry.clone(),
            Duration::from_secs(5),
            stop.clone(),
        ));

        tokio::time::sleep(Duration::from_secs(6)).await;
        stop.cancel();
        handle.await.unwrap();

        assert_eq!(rx.recv().await.unwrap().series, "pending");
        let sample = rx.recv().await.unwrap();
        assert_eq!(sample.series, CHANNEL_SERIES);
        assert_eq!(sample.tags["channel"], "points");
        assert_eq!(sample.fields["channel_len"], FieldValue::Int(1));
        assert_eq!(sample.fields["dropped"], FieldValue::Int(0));
        assert!(rx.try_recv().is_err());
    }
}
