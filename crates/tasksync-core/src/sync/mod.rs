//! Sync orchestration between the local store and a remote snapshot.
//!
//! A run loads credentials, fetches and decodes the remote snapshot,
//! reconciles it with the local collection, writes winning remote records
//! back locally, then uploads the updated local collection. Runs are
//! serialized per orchestrator and report progress through [`SyncStatus`].

mod gateway;
mod orchestrator;
mod scheduler;
mod session;
mod status;

#[cfg(test)]
mod tests;

pub use gateway::{SettingsStore, TaskStore};
pub use orchestrator::{CancellationFlag, SyncError, SyncOrchestrator, SyncReport};
pub use scheduler::{AutoSync, AutoSyncSummary};
pub use session::{RemoteSnapshotState, SyncSession};
pub use status::{StatusBoard, StatusEvent, SyncStatus};
