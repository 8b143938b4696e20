//! Periodic automatic sync.

use std::future::Future;
use std::time::Duration;

use super::gateway::{SettingsStore, TaskStore};
use super::orchestrator::{SyncError, SyncOrchestrator};
use crate::transport::{NetworkProbe, TransportConnector};

/// Counters from one scheduler lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AutoSyncSummary {
    pub ticks: usize,
    pub successes: usize,
    pub failures: usize,
    /// Ticks skipped because auto-sync was disabled or a run was in flight
    pub skipped: usize,
}

/// Runs the orchestrator on a fixed interval until shut down.
///
/// Failed runs are retried on the next tick; there is no backoff. The
/// `auto_sync_enabled` setting is re-read on every tick.
#[derive(Debug, Clone, Copy)]
pub struct AutoSync {
    interval: Duration,
    max_ticks: Option<usize>,
}

impl AutoSync {
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            max_ticks: None,
        }
    }

    /// Stop after this many ticks
    #[must_use]
    pub const fn with_max_ticks(mut self, max_ticks: usize) -> Self {
        self.max_ticks = Some(max_ticks);
        self
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    pub async fn run<S, C, P>(
        &self,
        orchestrator: &SyncOrchestrator<S, C, P>,
        shutdown: impl Future<Output = ()>,
    ) -> AutoSyncSummary
    where
        S: TaskStore + SettingsStore,
        C: TransportConnector,
        P: NetworkProbe,
    {
        tokio::pin!(shutdown);
        let mut summary = AutoSyncSummary::default();
        tracing::info!("Auto-sync every {}s", self.interval.as_secs_f64());

        loop {
            if self.max_ticks.is_some_and(|max| summary.ticks >= max) {
                break;
            }

            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("Auto-sync stopped");
                    break;
                }
                () = tokio::time::sleep(self.interval) => {}
            }
            summary.ticks += 1;

            match orchestrator.store().load_sync_settings().await {
                Ok(settings) if !settings.auto_sync_enabled => {
                    tracing::debug!("Auto-sync disabled; skipping tick");
                    summary.skipped += 1;
                    continue;
                }
                Ok(_) => {}
                Err(error) => {
                    tracing::warn!("Failed to load sync settings: {error}");
                    summary.failures += 1;
                    continue;
                }
            }

            match orchestrator.sync().await {
                Ok(_) => summary.successes += 1,
                Err(SyncError::AlreadyRunning) => summary.skipped += 1,
                // Already logged by the orchestrator.
                Err(_) => summary.failures += 1,
            }
        }

        summary
    }
}
