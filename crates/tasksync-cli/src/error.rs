use std::io;

use tasksync_core::sync::SyncError;
use tasksync_core::TaskId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] tasksync_core::Error),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No task title provided")]
    EmptyTitle,
    #[error("Invalid task id: '{0}'")]
    InvalidTaskId(String),
    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),
    #[error("Invalid date '{0}': expected YYYY-MM-DD or RFC 3339")]
    InvalidDate(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Auto-sync is disabled. Run `tasksync config set --auto-sync true` first.")]
    AutoSyncDisabled,
}
