use std::env;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tasksync_core::codec::{format_timestamp, is_encodable};
use tasksync_core::db::TaskFilter;
use tasksync_core::models::{ConflictLogEntry, RemoteCredentials};
use tasksync_core::services::DatabaseService;
use tasksync_core::sync::{SettingsStore, TaskStore};
use tasksync_core::{Snapshot, SyncConflict, SyncSettings, TaskId, TaskRecord};

use crate::cli::ListFilter;
use crate::error::CliError;

const DB_PATH_ENV: &str = "TASKSYNC_DB_PATH";

#[derive(Debug, Serialize)]
pub struct TaskListItem {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub completed: bool,
    pub priority: String,
    pub category_id: Option<i64>,
    pub due_date: Option<String>,
    pub completed_date: Option<String>,
    pub created_date: String,
    pub modified_date: String,
    pub relative_time: String,
}

#[derive(Debug, Serialize)]
pub struct SyncConflictItem {
    pub id: i64,
    pub task_id: i64,
    pub local_modified: String,
    pub remote_modified: String,
    pub winner: String,
    pub resolved_at: String,
    pub strategy: String,
}

/// Store wrapper that prefers remote credentials from the environment.
///
/// Stored settings are used when no `TASKSYNC_REMOTE_*` variable is set.
#[derive(Clone)]
pub struct EnvCredentialsStore {
    inner: DatabaseService,
    credentials: Option<RemoteCredentials>,
}

impl EnvCredentialsStore {
    pub fn from_env(inner: DatabaseService) -> Result<Self, CliError> {
        let credentials = RemoteCredentials::from_env()?;
        if credentials.is_some() {
            tracing::info!("Using remote credentials from TASKSYNC_REMOTE_* environment");
        }
        Ok(Self { inner, credentials })
    }
}

impl TaskStore for EnvCredentialsStore {
    async fn get_all_records(&self) -> tasksync_core::Result<Snapshot> {
        self.inner.get_all_records().await
    }

    async fn upsert(&self, record: &TaskRecord) -> tasksync_core::Result<()> {
        self.inner.upsert(record).await
    }

    async fn upsert_all(&self, records: &[TaskRecord]) -> tasksync_core::Result<()> {
        self.inner.upsert_all(records).await
    }

    async fn record_conflicts(
        &self,
        conflicts: &[SyncConflict],
        resolved_at: DateTime<Utc>,
    ) -> tasksync_core::Result<()> {
        self.inner.record_conflicts(conflicts, resolved_at).await
    }
}

impl SettingsStore for EnvCredentialsStore {
    async fn load_sync_settings(&self) -> tasksync_core::Result<SyncSettings> {
        let mut settings = self.inner.load_sync_settings().await?;
        if let Some(credentials) = self.credentials.clone() {
            settings.apply_credentials(credentials);
        }
        Ok(settings)
    }

    async fn save_sync_settings(&self, settings: &SyncSettings) -> tasksync_core::Result<()> {
        self.inner.save_sync_settings(settings).await
    }

    async fn record_sync_completed(&self, at: DateTime<Utc>) -> tasksync_core::Result<()> {
        self.inner.record_sync_completed(at).await
    }
}

pub const fn task_filter(filter: ListFilter) -> TaskFilter {
    match filter {
        ListFilter::All => TaskFilter::All,
        ListFilter::Active => TaskFilter::Active,
        ListFilter::Completed => TaskFilter::Completed,
    }
}

pub fn parse_task_id(id: &str) -> Result<TaskId, CliError> {
    id.parse::<TaskId>()
        .map_err(|_| CliError::InvalidTaskId(id.trim().to_string()))
}

pub async fn resolve_task(id: &str, db: &DatabaseService) -> Result<TaskRecord, CliError> {
    let task_id = parse_task_id(id)?;
    db.get_task(task_id)
        .await?
        .ok_or(CliError::TaskNotFound(task_id))
}

/// Parse a due date given as `YYYY-MM-DD` (midnight UTC) or RFC 3339.
///
/// Years outside 0000-9999 are rejected; they cannot be synced.
pub fn parse_due_date(value: &str) -> Result<DateTime<Utc>, CliError> {
    let value = value.trim();
    let parsed = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
        .or_else(|| {
            DateTime::parse_from_rfc3339(value).ok().map(|instant| {
                // Stored instants carry millisecond precision.
                tasksync_core::util::from_unix_millis(instant.timestamp_millis())
            })
        });

    parsed
        .filter(is_encodable)
        .ok_or_else(|| CliError::InvalidDate(value.to_string()))
}

pub fn normalize_title(parts: &[String]) -> Result<String, CliError> {
    let title = parts.join(" ");
    let title = title.trim();
    if title.is_empty() {
        Err(CliError::EmptyTitle)
    } else {
        Ok(title.to_string())
    }
}

pub fn format_task_lines(tasks: &[TaskRecord], now: DateTime<Utc>) -> Vec<String> {
    tasks
        .iter()
        .map(|task| {
            let mark = if task.completed { 'x' } else { ' ' };
            let title = task_preview(task, 40);
            let due = task.due_date.map_or_else(String::new, |due| {
                format!("due {}", due.format("%Y-%m-%d"))
            });
            let relative_time = format_relative_time(task.modified_date, now);
            format!(
                "{:>5}  [{mark}]  {title:<40}  {:<6}  {due:<14}  {relative_time}",
                task.id.get(),
                task.priority.as_str()
            )
            .trim_end()
            .to_string()
        })
        .collect()
}

pub fn task_to_list_item(task: &TaskRecord, now: DateTime<Utc>) -> TaskListItem {
    TaskListItem {
        id: task.id.get(),
        title: task.title.clone(),
        description: task.description.clone(),
        completed: task.completed,
        priority: task.priority.as_str().to_string(),
        category_id: task.category_id,
        due_date: task.due_date.as_ref().map(format_timestamp),
        completed_date: task.completed_date.as_ref().map(format_timestamp),
        created_date: format_timestamp(&task.created_date),
        modified_date: format_timestamp(&task.modified_date),
        relative_time: format_relative_time(task.modified_date, now),
    }
}

pub fn task_preview(task: &TaskRecord, max_chars: usize) -> String {
    let collapsed = task.title_preview(usize::MAX);
    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn sync_conflict_to_item(entry: &ConflictLogEntry) -> SyncConflictItem {
    SyncConflictItem {
        id: entry.id,
        task_id: entry.conflict.task_id.get(),
        local_modified: format_timestamp(&entry.conflict.local_modified),
        remote_modified: format_timestamp(&entry.conflict.remote_modified),
        winner: entry.conflict.winner.as_str().to_string(),
        resolved_at: format_timestamp(&entry.resolved_at),
        strategy: entry.strategy.clone(),
    }
}

pub fn format_sync_conflict_lines(conflicts: &[ConflictLogEntry]) -> Vec<String> {
    conflicts
        .iter()
        .map(|entry| {
            format!(
                "{}  {:<4}  task={}  winner={}  local={} remote={}",
                format_sync_timestamp(entry.resolved_at),
                entry.strategy,
                entry.conflict.task_id,
                entry.conflict.winner.as_str(),
                format_timestamp(&entry.conflict.local_modified),
                format_timestamp(&entry.conflict.remote_modified)
            )
        })
        .collect()
}

pub fn format_sync_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

pub fn format_relative_time(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = (now - at).num_milliseconds().max(0);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os(DB_PATH_ENV).map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tasksync")
        .join("tasksync.db")
}

pub fn open_database(path: &Path) -> Result<DatabaseService, CliError> {
    Ok(DatabaseService::open_path(path)?)
}
