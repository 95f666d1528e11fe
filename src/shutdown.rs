//! Shutdown coordination.
//!
//! The coordinator owns the stop flag and join handle of every pipeline task.
//! On the termination signal it moves `Running → Stopping`: collectors are
//! stopped first, then the publisher, then the state change is broadcast. Once
//! every task has returned it moves to `Stopped`.

use std::future::Future;

use strum_macros::{AsRefStr, Display};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::collector::{Collector, Source};
use crate::publisher::{EventSink, PublishStats, Publisher};

/// Cooperative stop flag.
///
/// Setting it is idempotent and never blocks. Loops poll it between steps and
/// race their blocking waits against [`StopFlag::stopped`].
#[derive(Debug, Clone, Default)]
pub struct StopFlag {
    token: CancellationToken,
}

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the owning loop to stop.
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the flag is set.
    pub async fn stopped(&self) {
        self.token.cancelled().await;
    }
}

/// Pipeline lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum ShutdownState {
    Running,
    Stopping,
    Stopped,
}

/// Outcome of a completed shutdown.
#[derive(Debug, Clone, Default)]
pub struct ShutdownReport {
    /// Publisher counters, when a publisher was registered and exited cleanly.
    pub publish: Option<PublishStats>,
    /// Collectors that were joined.
    pub collectors: usize,
    /// Tasks that panicked instead of returning.
    pub panicked: usize,
}

struct CollectorTask {
    name: String,
    stop: StopFlag,
    handle: JoinHandle<()>,
}

struct PublisherTask {
    stop: StopFlag,
    handle: JoinHandle<PublishStats>,
}

/// Owns every pipeline task and drives the shutdown state machine.
pub struct ShutdownCoordinator {
    collectors: Vec<CollectorTask>,
    publisher: Option<PublisherTask>,
    state: watch::Sender<ShutdownState>,
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ShutdownCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownCoordinator")
            .field("state", &self.state())
            .field("collectors", &self.collectors.len())
            .field("publisher", &self.publisher.is_some())
            .finish()
    }
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (state, _) = watch::channel(ShutdownState::Running);
        Self {
            collectors: Vec::new(),
            publisher: None,
            state,
        }
    }

    pub fn state(&self) -> ShutdownState {
        *self.state.borrow()
    }

    /// Receive every state transition.
    pub fn subscribe(&self) -> watch::Receiver<ShutdownState> {
        self.state.subscribe()
    }

    /// Spawn a collector task and take ownership of its lifecycle.
    pub fn spawn_collector<S: Source>(&mut self, collector: Collector<S>) {
        let name = collector.name().to_string();
        let stop = collector.stop_flag();
        let handle = tokio::spawn(collector.start());
        tracing::info!(collector = %name, "Collector spawned");
        self.collectors.push(CollectorTask { name, stop, handle });
    }

    /// Spawn the publisher task. Only one publisher is allowed.
    pub fn spawn_publisher<K: EventSink>(&mut self, publisher: Publisher<K>) {
        if self.publisher.is_some() {
            tracing::error!("Publisher already registered, ignoring");
            return;
        }
        let stop = publisher.stop_flag();
        let handle = tokio::spawn(publisher.start());
        tracing::info!("Publisher spawned");
        self.publisher = Some(PublisherTask { stop, handle });
    }

    /// Move `Running → Stopping`. Calling it again has no further effect.
    pub fn begin_shutdown(&self) {
        if self.state() != ShutdownState::Running {
            return;
        }

        tracing::info!(collectors = self.collectors.len(), "Stopping collectors");
        for task in &self.collectors {
            task.stop.stop();
        }
        if let Some(ref publisher) = self.publisher {
            tracing::info!("Stopping publisher");
            publisher.stop.stop();
        }

        self.state.send_replace(ShutdownState::Stopping);
    }

    /// Wait for `signal`, stop everything and join every task.
    pub async fn run_until<F>(self, signal: F) -> ShutdownReport
    where
        F: Future<Output = ()>,
    {
        signal.await;
        self.shutdown().await
    }

    /// Stop and join every task without waiting for a signal.
    pub async fn shutdown(self) -> ShutdownReport {
        self.begin_shutdown();

        let mut report = ShutdownReport::default();
        for task in self.collectors {
            match task.handle.await {
                Ok(()) => {
                    tracing::debug!(collector = %task.name, "Collector joined");
                    report.collectors += 1;
                }
                Err(e) => {
                    tracing::error!(collector = %task.name, error = %e, "Collector task failed");
                    report.panicked += 1;
                }
            }
        }

        if let Some(publisher) = self.publisher {
            match publisher.handle.await {
                Ok(stats) => report.publish = Some(stats),
                Err(e) => {
                    tracing::error!(error = %e, "Publisher task failed");
                    report.panicked += 1;
                }
            }
        }

        self.state.send_replace(ShutdownState::Stopped);
        tracing::info!(
            collectors = report.collectors,
            panicked = report.panicked,
            "Shutdown complete"
        );
        report
    }
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_flag_idempotent() {
        let flag = StopFlag::new();
        let observer = flag.clone();
        assert!(!observer.is_stopped());
        flag.stop();
        flag.stop();
        assert!(observer.is_stopped());
    }

    #[test]
    fn test_state_strings() {
        assert_eq!(ShutdownState::Running.as_ref(), "running");
        assert_eq!(ShutdownState::Stopped.to_string(), "stopped");
    }

    #[tokio::test]
    async fn test_empty_coordinator_transitions() {
        let coordinator = ShutdownCoordinator::new();
        let mut rx = coordinator.subscribe();
        assert_eq!(coordinator.state(), ShutdownState::Running);

        coordinator.begin_shutdown();
        assert_eq!(*rx.borrow_and_update(), ShutdownState::Stopping);
        coordinator.begin_shutdown();
        assert!(!rx.has_changed().unwrap());

        let report = coordinator.run_until(async {}).await;
        assert_eq!(*rx.borrow_and_update(), ShutdownState::Stopped);
        assert_eq!(report.collectors, 0);
        assert!(report.publish.is_none());
    }
}
