//! Data models for tasksync

mod settings;
mod snapshot;
mod sync_conflict;
mod task;

pub use settings::{RemoteCredentials, SyncSettings, DEFAULT_AUTO_SYNC_INTERVAL_SECS};
pub use snapshot::{DuplicateTaskId, Snapshot};
pub use sync_conflict::{ConflictLogEntry, ConflictSide, SyncConflict};
pub use task::{NewTask, Priority, TaskId, TaskRecord};
