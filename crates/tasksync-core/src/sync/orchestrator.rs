//! Drives one end-to-end sync run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{broadcast, watch, Mutex};

use super::gateway::{SettingsStore, TaskStore};
use super::session::{RemoteSnapshotState, SyncSession};
use super::status::{StatusBoard, StatusEvent, SyncStatus};
use crate::merge::reconcile;
use crate::transport::{
    AssumeOnline, NetworkProbe, RemoteLayout, TransportConnector, TransportError,
};
use crate::util::now_millis;

/// Why a sync run did not complete
#[derive(Debug, Error)]
pub enum SyncError {
    /// No reachable network path
    #[error("No network connection")]
    NoNetwork,

    /// Remote address, principal or secret is empty
    #[error("Sync credentials are incomplete. Missing: {}", .0.join(", "))]
    MissingCredentials(Vec<&'static str>),

    #[error("Remote sync failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Local store failed during sync: {0}")]
    LocalStore(#[from] crate::Error),

    /// Another run holds the gate
    #[error("A sync is already running")]
    AlreadyRunning,

    #[error("Sync was cancelled")]
    Cancelled,
}

impl SyncError {
    /// Terminal status this error leaves behind; `None` leaves status untouched
    #[must_use]
    pub const fn status(&self) -> Option<SyncStatus> {
        match self {
            Self::NoNetwork => Some(SyncStatus::ErrorNoNetwork),
            Self::MissingCredentials(_) => Some(SyncStatus::ErrorNoCredentials),
            Self::Transport(_) | Self::LocalStore(_) | Self::Cancelled => {
                Some(SyncStatus::ErrorSyncFailed)
            }
            Self::AlreadyRunning => None,
        }
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub remote: RemoteSnapshotState,
    /// Records written to the local store
    pub local_changes: usize,
    pub conflicts: usize,
    /// Records in the uploaded snapshot
    pub uploaded: usize,
    pub completed_at: DateTime<Utc>,
}

/// Cooperative cancellation, checked between sync phases
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    fn check(&self, phase: &str) -> Result<(), SyncError> {
        if self.is_cancelled() {
            tracing::info!("Sync cancelled before {phase}");
            return Err(SyncError::Cancelled);
        }
        Ok(())
    }
}

/// Reconciles a local store with one remote, one run at a time.
///
/// Local edits made while a run is uploading are not part of that run's
/// upload; the next run picks them up.
pub struct SyncOrchestrator<S, C, P = AssumeOnline> {
    store: S,
    connector: C,
    probe: P,
    layout: RemoteLayout,
    gate: Mutex<()>,
    status: StatusBoard,
    cancellation: CancellationFlag,
}

impl<S, C> SyncOrchestrator<S, C, AssumeOnline>
where
    S: TaskStore + SettingsStore,
    C: TransportConnector,
{
    pub fn new(store: S, connector: C) -> Self {
        Self::with_probe(store, connector, AssumeOnline)
    }
}

impl<S, C, P> SyncOrchestrator<S, C, P>
where
    S: TaskStore + SettingsStore,
    C: TransportConnector,
    P: NetworkProbe,
{
    pub fn with_probe(store: S, connector: C, probe: P) -> Self {
        Self {
            store,
            connector,
            probe,
            layout: RemoteLayout::default(),
            gate: Mutex::new(()),
            status: StatusBoard::new(),
            cancellation: CancellationFlag::new(),
        }
    }

    #[must_use]
    pub fn with_layout(mut self, layout: RemoteLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Share a cancellation flag with another component
    #[must_use]
    pub fn with_cancellation(mut self, cancellation: CancellationFlag) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn layout(&self) -> &RemoteLayout {
        &self.layout
    }

    #[must_use]
    pub fn status(&self) -> SyncStatus {
        self.status.current()
    }

    /// Completion instant of the last successful run seen by this orchestrator
    #[must_use]
    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        self.status.last_success()
    }

    #[must_use]
    pub fn watch_status(&self) -> watch::Receiver<SyncStatus> {
        self.status.watch()
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.status.subscribe()
    }

    /// Handle that cancels the in-flight run at its next phase boundary
    #[must_use]
    pub fn cancellation(&self) -> CancellationFlag {
        self.cancellation.clone()
    }

    /// Whether a run currently holds the gate
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.gate.try_lock().is_err()
    }

    /// Run one sync.
    ///
    /// Rejected with [`SyncError::AlreadyRunning`] while another run is in
    /// flight. Every other outcome leaves a terminal status.
    pub async fn sync(&self) -> Result<SyncReport, SyncError> {
        let Ok(_guard) = self.gate.try_lock() else {
            tracing::debug!("Sync requested while another run is in flight");
            return Err(SyncError::AlreadyRunning);
        };

        self.cancellation.reset();
        if self.status.current().is_terminal() {
            self.status.publish(SyncStatus::Idle);
        }

        let result = self.run().await;
        match &result {
            Ok(report) => {
                tracing::info!(
                    local_changes = report.local_changes,
                    conflicts = report.conflicts,
                    uploaded = report.uploaded,
                    "Sync completed"
                );
                self.status.record_success(report.completed_at);
                self.status.publish(SyncStatus::Success);
            }
            Err(error) => {
                tracing::warn!("Sync failed: {error}");
                if let Some(status) = error.status() {
                    self.status.publish(status);
                }
            }
        }
        result
    }

    async fn run(&self) -> Result<SyncReport, SyncError> {
        let settings = self.store.load_sync_settings().await?;
        self.status.seed_last_success(settings.last_sync_completed_at);

        if !self.probe.is_online(settings.remote_url.as_deref()).await {
            return Err(SyncError::NoNetwork);
        }
        let credentials = settings
            .credentials()
            .map_err(SyncError::MissingCredentials)?;

        self.status.publish(SyncStatus::Syncing);
        tracing::info!("Starting sync with {}", credentials.base_url);

        let transport = self.connector.connect(&credentials)?;
        let session = SyncSession::new(
            credentials,
            self.layout.clone(),
            transport,
            settings.last_sync_completed_at,
        );

        session.ensure_remote().await?;
        self.cancellation.check("fetching the remote snapshot")?;

        let (remote_state, remote) = session.fetch_remote().await?;
        self.cancellation.check("reconciling")?;

        let local = self.store.get_all_records().await?;
        let outcome = reconcile(&local, &remote);
        tracing::debug!(
            local = local.len(),
            remote = remote.len(),
            merged = outcome.merged.len(),
            "Reconciled snapshots"
        );

        self.store.upsert_all(&outcome.local_changes).await?;
        if !outcome.conflicts.is_empty() {
            self.store
                .record_conflicts(&outcome.conflicts, now_millis())
                .await?;
        }
        self.cancellation.check("uploading")?;

        let updated = self.store.get_all_records().await?;
        session.upload(&updated).await?;

        let completed_at = now_millis();
        self.store.record_sync_completed(completed_at).await?;

        Ok(SyncReport {
            remote: remote_state,
            local_changes: outcome.local_changes.len(),
            conflicts: outcome.conflicts.len(),
            uploaded: updated.len(),
            completed_at,
        })
    }
}
