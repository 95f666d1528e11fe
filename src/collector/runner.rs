//! Generic poll loop shared by every source.

use std::time::Duration;

use tokio::time::{Instant, sleep, timeout};

use crate::collector::{CollectorError, Source};
use crate::event::EventSender;
use crate::shutdown::StopFlag;
use crate::telemetry::{MeasurementPoint, Telemetry};

/// Series for the per-cycle request measurement.
pub const CYCLE_SERIES: &str = "collectors";

/// Result of a single fetch-decode-emit cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Cycle completed; this many events were handed to the bus.
    Emitted(usize),
    /// Fetch failed; nothing was emitted.
    Failed,
    /// Stop was requested while emitting; remaining events were dropped.
    Stopped,
}

/// Polls one source on its interval until its stop flag is set.
pub struct Collector<S: Source> {
    source: S,
    events: EventSender,
    telemetry: Telemetry,
    stop: StopFlag,
}

impl<S: Source> std::fmt::Debug for Collector<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collector")
            .field("config", self.source.config())
            .field("stopped", &self.stop.is_stopped())
            .finish_non_exhaustive()
    }
}

impl<S: Source> Collector<S> {
    pub fn new(source: S, events: EventSender, telemetry: Telemetry) -> Self {
        Self {
            source,
            events,
            telemetry,
            stop: StopFlag::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.source.config().name
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Handle for stopping this collector from another task.
    pub fn stop_flag(&self) -> StopFlag {
        self.stop.clone()
    }

    /// Request the loop to stop. Idempotent and non-blocking.
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Run cycles until stopped.
    ///
    /// Each cycle is followed by the full interval sleep; a stop request cuts
    /// the sleep short.
    pub async fn start(self) {
        let interval = self.source.config().interval;
        tracing::info!(collector = %self.name(), interval = ?interval, "Collector started");

        while !self.stop.is_stopped() {
            let outcome = self.run_cycle().await;
            tracing::debug!(collector = %self.name(), ?outcome, "Cycle finished");

            tokio::select! {
                _ = self.stop.stopped() => break,
                _ = sleep(interval) => {}
            }
        }

        tracing::info!(collector = %self.name(), "Collector stopped");
    }

    /// Perform one fetch-decode-emit cycle.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let config = self.source.config();
        tracing::debug!(collector = %config.name, url = %config.url, "Making request");

        let start = Instant::now();
        let fetched = match timeout(config.timeout, self.source.fetch()).await {
            Ok(Ok(fetched)) => fetched,
            Ok(Err(e)) => return self.fail(start.elapsed(), None, e),
            Err(_) => return self.fail(start.elapsed(), None, CollectorError::Timeout(config.timeout)),
        };
        let elapsed = start.elapsed();

        if !fetched.is_success() {
            let status = fetched.status;
            return self.fail(elapsed, Some(status), CollectorError::Status(status));
        }

        let records = match self.source.decode(&fetched.body) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(collector = %config.name, error = %e, "Failed to decode response");
                self.record_cycle(elapsed, Some(fetched.status), 0, Some(&e));
                return CycleOutcome::Emitted(0);
            }
        };
        self.record_cycle(elapsed, Some(fetched.status), records.len(), None);

        let mut emitted = 0;
        for record in records {
            self.telemetry.record_with(|| self.source.summarize(&record));

            let event = self.source.normalize(record);
            tokio::select! {
                biased;
                sent = self.events.send(event) => {
                    if sent.is_err() {
                        tracing::warn!(collector = %config.name, "Event bus closed, dropping events");
                        return CycleOutcome::Emitted(emitted);
                    }
                }
                _ = self.stop.stopped() => {
                    tracing::debug!(collector = %config.name, emitted, "Stop requested, dropping remaining events");
                    return CycleOutcome::Stopped;
                }
            }
            emitted += 1;
        }

        CycleOutcome::Emitted(emitted)
    }

    fn fail(&self, elapsed: Duration, status: Option<u16>, error: CollectorError) -> CycleOutcome {
        tracing::warn!(collector = %self.name(), error = %error, "Request failed");
        self.record_cycle(elapsed, status, 0, Some(&error));
        CycleOutcome::Failed
    }

    fn record_cycle(
        &self,
        elapsed: Duration,
        status: Option<u16>,
        records: usize,
        error: Option<&CollectorError>,
    ) {
        self.telemetry.record_with(|| {
            let mut point = MeasurementPoint::new(CYCLE_SERIES)
                .with_tag("collector", self.source.config().kind.to_string())
                .with_field("response_time", elapsed)
                .with_field("records", records)
                .with_field("success", error.is_none());
            if let Some(status) = status {
                point = point.with_field("response_code", status);
            }
            if let Some(e) = error {
                point = point.with_field("error", e.to_string());
            }
            point
        });
    }
}
