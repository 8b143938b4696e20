//! Snapshot codec: task collection <-> self-describing JSON payload.
//!
//! The payload is a JSON array with one object per task, using explicit
//! camelCase key names. Instants use the fixed pattern
//! `yyyy-MM-ddTHH:mm:ss.SSSZ` in UTC. Optional fields are omitted when absent
//! and tolerated when missing or `null`; required fields (`id`, `title`,
//! `createdDate`, `modifiedDate`) fail decoding instead of being defaulted.

use chrono::{DateTime, Datelike, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{DuplicateTaskId, Priority, Snapshot, TaskId, TaskRecord};

/// `chrono` format string for encoded instants
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

const TIMESTAMP_LEN: usize = "2024-01-01T00:00:00.000Z".len();

/// Snapshot payload could not be decoded
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Not JSON, not an array of task objects, or a required field is missing
    #[error("malformed snapshot payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// An instant does not match the fixed timestamp pattern
    #[error("task {task}: field '{field}' has invalid timestamp '{value}'")]
    Timestamp {
        task: TaskId,
        field: &'static str,
        value: String,
    },

    /// Priority ordinal outside {0, 1, 2}
    #[error("task {task}: unknown priority ordinal {value}")]
    Priority { task: TaskId, value: i64 },

    /// Title is empty or whitespace
    #[error("task {0}: title must not be empty")]
    EmptyTitle(TaskId),

    /// Same id appears twice
    #[error(transparent)]
    Duplicate(#[from] DuplicateTaskId),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTask {
    id: i64,
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    is_completed: Option<bool>,
    #[serde(default)]
    priority: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    category_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    completed_date: Option<String>,
    created_date: String,
    modified_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    is_deleted: Option<bool>,
}

impl From<&TaskRecord> for WireTask {
    fn from(record: &TaskRecord) -> Self {
        Self {
            id: record.id.get(),
            title: record.title.clone(),
            description: Some(record.description.clone()),
            is_completed: Some(record.completed),
            priority: Some(record.priority.ordinal()),
            category_id: record.category_id.filter(|id| *id != 0),
            due_date: record.due_date.as_ref().map(format_timestamp),
            completed_date: record.completed_date.as_ref().map(format_timestamp),
            created_date: format_timestamp(&record.created_date),
            modified_date: format_timestamp(&record.modified_date),
            is_deleted: record.deleted.then_some(true),
        }
    }
}

impl TryFrom<WireTask> for TaskRecord {
    type Error = DecodeError;

    fn try_from(wire: WireTask) -> Result<Self, Self::Error> {
        let id = TaskId::new(wire.id);
        if wire.title.trim().is_empty() {
            return Err(DecodeError::EmptyTitle(id));
        }

        let priority = match wire.priority {
            None => Priority::default(),
            Some(value) => Priority::from_ordinal(value)
                .ok_or(DecodeError::Priority { task: id, value })?,
        };

        let optional = |field: &'static str, value: Option<String>| {
            value
                .map(|value| parse_timestamp(id, field, &value))
                .transpose()
        };

        Ok(Self {
            id,
            title: wire.title,
            description: wire.description.unwrap_or_default(),
            completed: wire.is_completed.unwrap_or(false),
            priority,
            category_id: wire.category_id.filter(|id| *id != 0),
            due_date: optional("dueDate", wire.due_date)?,
            completed_date: optional("completedDate", wire.completed_date)?,
            created_date: parse_timestamp(id, "createdDate", &wire.created_date)?,
            modified_date: parse_timestamp(id, "modifiedDate", &wire.modified_date)?,
            deleted: wire.is_deleted.unwrap_or(false),
        })
    }
}

/// Serialize a snapshot into its wire payload, ordered by task id
#[must_use]
pub fn encode_snapshot(snapshot: &Snapshot) -> Vec<u8> {
    let wire = snapshot.records().map(WireTask::from).collect::<Vec<_>>();
    serde_json::to_vec(&wire).expect("task wire structs always serialize")
}

/// Parse a wire payload into a snapshot
pub fn decode_snapshot(bytes: &[u8]) -> Result<Snapshot, DecodeError> {
    let wire: Vec<WireTask> = serde_json::from_slice(bytes)?;
    let records = wire
        .into_iter()
        .map(TaskRecord::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Snapshot::try_from_records(records)?)
}

/// Whether an instant fits the fixed wire pattern (years 0000-9999).
///
/// `%Y` writes other years with a sign and more digits, which decoding rejects.
#[must_use]
pub fn is_encodable(instant: &DateTime<Utc>) -> bool {
    (0..=9999).contains(&instant.year())
}

/// Format an instant with the fixed wire pattern
#[must_use]
pub fn format_timestamp(instant: &DateTime<Utc>) -> String {
    instant.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_timestamp(
    task: TaskId,
    field: &'static str,
    value: &str,
) -> Result<DateTime<Utc>, DecodeError> {
    let invalid = || DecodeError::Timestamp {
        task,
        field,
        value: value.to_string(),
    };

    // chrono accepts a missing fraction for `%.3f`; the wire pattern does not.
    if value.len() != TIMESTAMP_LEN || value.as_bytes()[19] != b'.' {
        return Err(invalid());
    }

    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| invalid())
}
