//! Egress loop draining the event bus into the sink.

use crate::event::{EventReceiver, NormalizedEvent};
use crate::publisher::{EventSink, PublishError};
use crate::shutdown::StopFlag;

/// Counters reported when the publisher exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishStats {
    /// Events accepted by the sink.
    pub forwarded: u64,
    /// Events discarded because the sink reported disconnected.
    pub dropped_disconnected: u64,
    /// Events the sink failed to publish.
    pub failed: u64,
}

/// Sole consumer of the event bus and sole owner of the sink.
pub struct Publisher<K: EventSink> {
    sink: K,
    events: EventReceiver,
    stop: StopFlag,
}

impl<K: EventSink> std::fmt::Debug for Publisher<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("connected", &self.sink.is_connected())
            .field("stopped", &self.stop.is_stopped())
            .finish_non_exhaustive()
    }
}

impl<K: EventSink> Publisher<K> {
    /// Start the sink and take ownership of the bus receiver.
    ///
    /// # Errors
    /// Propagates the sink's start failure; the caller should abort startup.
    pub async fn connect(mut sink: K, events: EventReceiver) -> Result<Self, PublishError> {
        sink.start().await?;
        Ok(Self {
            sink,
            events,
            stop: StopFlag::new(),
        })
    }

    pub fn stop_flag(&self) -> StopFlag {
        self.stop.clone()
    }

    /// Request the loop to stop after draining. Idempotent and non-blocking.
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Forward events until stopped, drain what is left on the bus, then
    /// release the sink.
    pub async fn start(mut self) -> PublishStats {
        tracing::info!("Publisher started");
        let mut stats = PublishStats::default();

        loop {
            tokio::select! {
                biased;
                _ = self.stop.stopped() => break,
                event = self.events.recv() => match event {
                    Some(event) => self.forward(event, &mut stats).await,
                    None => {
                        tracing::debug!("Event bus closed");
                        break;
                    }
                },
            }
        }

        let mut drained = 0;
        while let Ok(event) = self.events.try_recv() {
            self.forward(event, &mut stats).await;
            drained += 1;
        }
        if drained > 0 {
            tracing::debug!(count = drained, "Drained pending events");
        }

        self.sink.stop().await;
        tracing::info!(
            forwarded = stats.forwarded,
            dropped_disconnected = stats.dropped_disconnected,
            failed = stats.failed,
            "Publisher stopped"
        );
        stats
    }

    async fn forward(&mut self, event: NormalizedEvent, stats: &mut PublishStats) {
        if !self.sink.is_connected() {
            stats.dropped_disconnected += 1;
            return;
        }
        match self.sink.publish(&event).await {
            Ok(()) => stats.forwarded += 1,
            Err(e) => {
                tracing::warn!(kind = %event.kind(), error = %e, "Failed to publish event");
                stats.failed += 1;
            }
        }
    }
}
