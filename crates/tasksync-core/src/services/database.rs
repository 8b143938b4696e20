//! Shared database service wrapper used across clients.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::db::{
    Database, SettingsRepository, SqliteSettingsRepository, SqliteTaskRepository, TaskFilter,
    TaskRepository,
};
use crate::models::{
    ConflictLogEntry, NewTask, Snapshot, SyncConflict, SyncSettings, TaskId, TaskRecord,
};
use crate::sync::{SettingsStore, TaskStore};
use crate::{Error, Result};

/// Thread-safe handle to the local store.
///
/// Constructed explicitly by the composing process and shared by cloning;
/// [`DatabaseService::close`] ends its lifecycle.
#[derive(Clone)]
pub struct DatabaseService {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl DatabaseService {
    /// Open a database service at the given filesystem path.
    pub fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&db_path)?;
        tracing::debug!("Opened local store at {}", db_path.display());
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory database service (primarily for tests).
    pub fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    /// Path of the backing file, `None` for in-memory stores.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Close the store. Fails while other clones of this handle are alive.
    pub fn close(self) -> Result<()> {
        let db = Arc::try_unwrap(self.db).map_err(|_| {
            Error::Database("cannot close the local store while it is still shared".to_string())
        })?;
        db.into_inner().close()
    }

    /// Create a task.
    pub async fn create_task(&self, task: &NewTask) -> Result<TaskRecord> {
        let db = self.db.lock().await;
        let repo = SqliteTaskRepository::new(db.connection());
        repo.create(task)
    }

    /// Fetch a live task by id.
    pub async fn get_task(&self, id: TaskId) -> Result<Option<TaskRecord>> {
        let db = self.db.lock().await;
        let repo = SqliteTaskRepository::new(db.connection());
        repo.get(id)
    }

    /// List live tasks.
    pub async fn list_tasks(
        &self,
        filter: TaskFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<TaskRecord>> {
        let db = self.db.lock().await;
        let repo = SqliteTaskRepository::new(db.connection());
        repo.list(filter, limit, offset)
    }

    /// Update a task's editable fields.
    pub async fn update_task(&self, task: &TaskRecord) -> Result<TaskRecord> {
        let db = self.db.lock().await;
        let repo = SqliteTaskRepository::new(db.connection());
        repo.update(task)
    }

    /// Mark a task completed or open.
    pub async fn set_task_completed(&self, id: TaskId, completed: bool) -> Result<TaskRecord> {
        let db = self.db.lock().await;
        let repo = SqliteTaskRepository::new(db.connection());
        repo.set_completed(id, completed)
    }

    /// Delete a task, leaving a tombstone for sync.
    pub async fn delete_task(&self, id: TaskId) -> Result<()> {
        let db = self.db.lock().await;
        let repo = SqliteTaskRepository::new(db.connection());
        repo.delete(id)
    }

    /// List recently resolved sync conflicts.
    pub async fn list_conflicts(&self, limit: usize) -> Result<Vec<ConflictLogEntry>> {
        let db = self.db.lock().await;
        let repo = SqliteTaskRepository::new(db.connection());
        repo.list_conflicts(limit)
    }
}

impl TaskStore for DatabaseService {
    async fn get_all_records(&self) -> Result<Snapshot> {
        let db = self.db.lock().await;
        let repo = SqliteTaskRepository::new(db.connection());
        repo.all_records()
    }

    async fn upsert(&self, record: &TaskRecord) -> Result<()> {
        let db = self.db.lock().await;
        let repo = SqliteTaskRepository::new(db.connection());
        repo.merge_record(record)?;
        Ok(())
    }

    async fn upsert_all(&self, records: &[TaskRecord]) -> Result<()> {
        let db = self.db.lock().await;
        let tx = db.connection().unchecked_transaction()?;
        let mut skipped = 0;
        {
            let repo = SqliteTaskRepository::new(&tx);
            for record in records {
                if !repo.merge_record(record)? {
                    skipped += 1;
                }
            }
        }
        tx.commit()?;
        if skipped > 0 {
            tracing::info!("Kept {skipped} local records edited since the sync snapshot");
        }
        Ok(())
    }

    async fn record_conflicts(
        &self,
        conflicts: &[SyncConflict],
        resolved_at: DateTime<Utc>,
    ) -> Result<()> {
        let db = self.db.lock().await;
        let tx = db.connection().unchecked_transaction()?;
        {
            let repo = SqliteTaskRepository::new(&tx);
            for conflict in conflicts {
                repo.record_conflict(conflict, resolved_at)?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

impl SettingsStore for DatabaseService {
    async fn load_sync_settings(&self) -> Result<SyncSettings> {
        let db = self.db.lock().await;
        let repo = SqliteSettingsRepository::new(db.connection());
        repo.load()
    }

    async fn save_sync_settings(&self, settings: &SyncSettings) -> Result<()> {
        let db = self.db.lock().await;
        let repo = SqliteSettingsRepository::new(db.connection());
        repo.save(settings)
    }

    async fn record_sync_completed(&self, at: DateTime<Utc>) -> Result<()> {
        let db = self.db.lock().await;
        let repo = SqliteSettingsRepository::new(db.connection());
        repo.record_sync_completed(at)
    }
}
