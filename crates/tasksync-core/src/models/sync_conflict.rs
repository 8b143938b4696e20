//! Sync conflict model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TaskId;

/// Which replica supplied the surviving record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictSide {
    Local,
    Remote,
}

impl ConflictSide {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "local" => Some(Self::Local),
            "remote" => Some(Self::Remote),
            _ => None,
        }
    }
}

/// A task present in both replicas with diverging content, resolved by LWW
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConflict {
    /// Task involved in the conflict
    pub task_id: TaskId,
    /// Local record's modification instant
    pub local_modified: DateTime<Utc>,
    /// Remote record's modification instant
    pub remote_modified: DateTime<Utc>,
    /// Side whose record survived
    pub winner: ConflictSide,
}

impl SyncConflict {
    /// Resolution strategy name recorded in the conflict log
    pub const STRATEGY: &'static str = "lww";
}

/// Persisted conflict log row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictLogEntry {
    /// Log row identifier
    pub id: i64,
    /// Resolved conflict
    pub conflict: SyncConflict,
    /// Resolution instant
    pub resolved_at: DateTime<Utc>,
    /// Resolution strategy name
    pub strategy: String,
}
