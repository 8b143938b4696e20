//! Collaborator boundaries consumed by the orchestrator.

use chrono::{DateTime, Utc};

use crate::models::{Snapshot, SyncConflict, SyncSettings, TaskRecord};
use crate::Result;

/// Read and write access to the authoritative local task collection
#[allow(async_fn_in_trait)]
pub trait TaskStore {
    /// Full local collection, tombstones included
    async fn get_all_records(&self) -> Result<Snapshot>;

    /// Insert a record, or replace the stored one if `record` supersedes it.
    ///
    /// A stored copy that is newer under last-writer-wins (for example a
    /// local edit made after the sync snapshot was read) is kept.
    async fn upsert(&self, record: &TaskRecord) -> Result<()>;

    /// [`Self::upsert`] for many records
    async fn upsert_all(&self, records: &[TaskRecord]) -> Result<()> {
        for record in records {
            self.upsert(record).await?;
        }
        Ok(())
    }

    /// Persist resolved conflicts for later inspection
    async fn record_conflicts(
        &self,
        conflicts: &[SyncConflict],
        resolved_at: DateTime<Utc>,
    ) -> Result<()>;
}

/// Sync settings and credentials, persisted as opaque key-value pairs
#[allow(async_fn_in_trait)]
pub trait SettingsStore {
    async fn load_sync_settings(&self) -> Result<SyncSettings>;

    async fn save_sync_settings(&self, settings: &SyncSettings) -> Result<()>;

    /// Persist the completion instant of a successful sync
    async fn record_sync_completed(&self, at: DateTime<Utc>) -> Result<()>;
}
