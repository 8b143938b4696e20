//! Task repository implementation

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT/OFFSET

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::codec::is_encodable;
use crate::error::{Error, Result};
use crate::merge::supersedes;
use crate::models::{
    ConflictLogEntry, ConflictSide, NewTask, Priority, Snapshot, SyncConflict, TaskId, TaskRecord,
};
use crate::util::{from_unix_millis, now_millis};

const TASK_COLUMNS: &str = "id, title, description, completed, priority, category_id, due_date, \
     completed_date, created_date, modified_date, is_deleted";

/// Which live tasks a listing should include
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskFilter {
    #[default]
    All,
    Active,
    Completed,
}

impl TaskFilter {
    const fn clause(self) -> &'static str {
        match self {
            Self::All => "",
            Self::Active => "AND completed = 0",
            Self::Completed => "AND completed = 1",
        }
    }
}

/// Trait for task storage operations
pub trait TaskRepository {
    /// Create a new task with a freshly assigned id
    fn create(&self, task: &NewTask) -> Result<TaskRecord>;

    /// Get a live task by ID
    fn get(&self, id: TaskId) -> Result<Option<TaskRecord>>;

    /// List live tasks, due soonest first then highest priority
    fn list(&self, filter: TaskFilter, limit: usize, offset: usize) -> Result<Vec<TaskRecord>>;

    /// Replace a live task's editable fields, bumping its modification instant
    fn update(&self, task: &TaskRecord) -> Result<TaskRecord>;

    /// Mark a live task completed or open
    fn set_completed(&self, id: TaskId, completed: bool) -> Result<TaskRecord>;

    /// Turn a live task into a tombstone
    fn delete(&self, id: TaskId) -> Result<()>;

    /// Every record including tombstones, as a sync snapshot
    fn all_records(&self) -> Result<Snapshot>;

    /// Insert or replace a record by id, exactly as given
    fn upsert(&self, task: &TaskRecord) -> Result<()>;

    /// Store a synced record unless the stored copy is at least as new.
    ///
    /// Returns whether the record was written.
    fn merge_record(&self, task: &TaskRecord) -> Result<bool>;

    /// Append a resolved conflict to the conflict log
    fn record_conflict(&self, conflict: &SyncConflict, resolved_at: DateTime<Utc>) -> Result<()>;

    /// Most recently resolved conflicts first
    fn list_conflicts(&self, limit: usize) -> Result<Vec<ConflictLogEntry>>;
}

/// `SQLite` implementation of `TaskRepository`
pub struct SqliteTaskRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteTaskRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn get_any(&self, id: TaskId) -> Result<Option<TaskRecord>> {
        let task = self
            .conn
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?"),
                params![id.get()],
                Self::parse_task,
            )
            .optional()?;
        Ok(task)
    }

    fn get_live_or_not_found(&self, id: TaskId) -> Result<TaskRecord> {
        self.get(id)?
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Parse a task from a database row
    fn parse_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskRecord> {
        let priority: i64 = row.get(4)?;
        Ok(TaskRecord {
            id: TaskId::new(row.get(0)?),
            title: row.get(1)?,
            description: row.get(2)?,
            completed: row.get(3)?,
            priority: Priority::from_ordinal(priority).unwrap_or_default(),
            category_id: row.get(5)?,
            due_date: row.get::<_, Option<i64>>(6)?.map(from_unix_millis),
            completed_date: row.get::<_, Option<i64>>(7)?.map(from_unix_millis),
            created_date: from_unix_millis(row.get(8)?),
            modified_date: from_unix_millis(row.get(9)?),
            deleted: row.get(10)?,
        })
    }

    fn parse_conflict(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConflictLogEntry> {
        let winner: String = row.get(4)?;
        Ok(ConflictLogEntry {
            id: row.get(0)?,
            conflict: SyncConflict {
                task_id: TaskId::new(row.get(1)?),
                local_modified: from_unix_millis(row.get(2)?),
                remote_modified: from_unix_millis(row.get(3)?),
                winner: ConflictSide::parse(&winner).unwrap_or(ConflictSide::Remote),
            },
            resolved_at: from_unix_millis(row.get(5)?),
            strategy: row.get(6)?,
        })
    }
}

fn millis(instant: Option<&DateTime<Utc>>) -> Option<i64> {
    instant.map(DateTime::timestamp_millis)
}

fn validate_due_date(due_date: Option<DateTime<Utc>>) -> Result<Option<DateTime<Utc>>> {
    match due_date {
        Some(due) if !is_encodable(&due) => Err(Error::InvalidInput(format!(
            "Due date {due} is outside years 0000-9999"
        ))),
        due => Ok(due),
    }
}

fn validate_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(Error::InvalidInput("Task title cannot be empty".into()));
    }
    Ok(title.to_string())
}

impl TaskRepository for SqliteTaskRepository<'_> {
    fn merge_record(&self, task: &TaskRecord) -> Result<bool> {
        if let Some(current) = self.get_any(task.id)? {
            if !supersedes(task, &current) {
                tracing::debug!(
                    "Kept stored task {} ({}), not older than the synced copy",
                    task.id,
                    current.modified_date
                );
                return Ok(false);
            }
        }
        self.upsert(task)?;
        Ok(true)
    }

    fn create(&self, task: &NewTask) -> Result<TaskRecord> {
        let title = validate_title(&task.title)?;
        let due_date = validate_due_date(task.due_date)?;
        let now = now_millis().timestamp_millis();

        self.conn.execute(
            "INSERT INTO tasks (title, description, priority, category_id, due_date, created_date, modified_date)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                title,
                task.description,
                task.priority.ordinal(),
                task.category_id.filter(|id| *id != 0),
                millis(due_date.as_ref()),
                now,
                now
            ],
        )?;

        let id = TaskId::new(self.conn.last_insert_rowid());
        self.get_live_or_not_found(id)
    }

    fn get(&self, id: TaskId) -> Result<Option<TaskRecord>> {
        Ok(self.get_any(id)?.filter(|task| !task.deleted))
    }

    fn list(&self, filter: TaskFilter, limit: usize, offset: usize) -> Result<Vec<TaskRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TASK_COLUMNS}
             FROM tasks
             WHERE is_deleted = 0 {}
             ORDER BY due_date IS NULL, due_date ASC, priority DESC, id ASC
             LIMIT ? OFFSET ?",
            filter.clause()
        ))?;

        let tasks = stmt
            .query_map(params![limit as i64, offset as i64], Self::parse_task)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(tasks)
    }

    fn update(&self, task: &TaskRecord) -> Result<TaskRecord> {
        let mut current = self.get_live_or_not_found(task.id)?;
        current.title = validate_title(&task.title)?;
        current.description.clone_from(&task.description);
        current.priority = task.priority;
        current.category_id = task.category_id.filter(|id| *id != 0);
        current.due_date = validate_due_date(task.due_date)?;
        current.touch();

        self.upsert(&current)?;
        Ok(current)
    }

    fn set_completed(&self, id: TaskId, completed: bool) -> Result<TaskRecord> {
        let mut current = self.get_live_or_not_found(id)?;
        current.set_completed(completed);
        self.upsert(&current)?;
        Ok(current)
    }

    fn delete(&self, id: TaskId) -> Result<()> {
        let mut current = self.get_live_or_not_found(id)?;
        current.mark_deleted();
        self.upsert(&current)
    }

    fn all_records(&self) -> Result<Snapshot> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {TASK_COLUMNS} FROM tasks ORDER BY id ASC"))?;

        let tasks = stmt
            .query_map([], Self::parse_task)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Snapshot::try_from_records(tasks).map_err(|error| Error::Database(error.to_string()))
    }

    fn upsert(&self, task: &TaskRecord) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO tasks (id, title, description, completed, priority, category_id,
                 due_date, completed_date, created_date, modified_date, is_deleted)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                task.id.get(),
                task.title,
                task.description,
                task.completed,
                task.priority.ordinal(),
                task.category_id,
                millis(task.due_date.as_ref()),
                millis(task.completed_date.as_ref()),
                task.created_date.timestamp_millis(),
                task.modified_date.timestamp_millis(),
                task.deleted
            ],
        )?;
        Ok(())
    }

    fn record_conflict(&self, conflict: &SyncConflict, resolved_at: DateTime<Utc>) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sync_conflicts (task_id, local_modified, remote_modified, winner, resolved_at, strategy)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                conflict.task_id.get(),
                conflict.local_modified.timestamp_millis(),
                conflict.remote_modified.timestamp_millis(),
                conflict.winner.as_str(),
                resolved_at.timestamp_millis(),
                SyncConflict::STRATEGY
            ],
        )?;
        Ok(())
    }

    fn list_conflicts(&self, limit: usize) -> Result<Vec<ConflictLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, task_id, local_modified, remote_modified, winner, resolved_at, strategy
             FROM sync_conflicts
             ORDER BY resolved_at DESC, id DESC
             LIMIT ?",
        )?;

        let conflicts = stmt
            .query_map(params![limit as i64], Self::parse_conflict)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(conflicts)
    }
}
