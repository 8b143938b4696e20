//! Task model

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use crate::util::now_millis;

/// Stable integer identity of a task, assigned at local creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(i64);

impl TaskId {
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

impl From<i64> for TaskId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Task priority, stored and encoded as its ordinal
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

impl Priority {
    #[must_use]
    pub const fn ordinal(self) -> i64 {
        match self {
            Self::Low => 0,
            Self::Normal => 1,
            Self::High => 2,
        }
    }

    #[must_use]
    pub const fn from_ordinal(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Low),
            1 => Some(Self::Normal),
            2 => Some(Self::High),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "0" => Ok(Self::Low),
            "normal" | "1" => Ok(Self::Normal),
            "high" | "2" => Ok(Self::High),
            other => Err(format!("unknown priority '{other}'")),
        }
    }
}

/// Fields supplied when creating a task locally
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub category_id: Option<i64>,
    pub due_date: Option<DateTime<Utc>>,
}

impl NewTask {
    #[must_use]
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// A task, the unit of synchronization
///
/// `modified_date` is the only signal the merge engine looks at; every mutation
/// goes through [`TaskRecord::touch`] so it strictly advances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Stable identity, unique within a snapshot
    pub id: TaskId,
    /// Non-empty title
    pub title: String,
    /// Free-form description, may be empty
    pub description: String,
    /// Completion flag
    pub completed: bool,
    /// Priority ordinal
    pub priority: Priority,
    /// Category reference; `None` means uncategorized
    pub category_id: Option<i64>,
    /// Optional due instant
    pub due_date: Option<DateTime<Utc>>,
    /// Instant the task was completed
    pub completed_date: Option<DateTime<Utc>>,
    /// Creation instant, immutable
    pub created_date: DateTime<Utc>,
    /// Last modification instant
    pub modified_date: DateTime<Utc>,
    /// Tombstone flag; deleted tasks still travel through sync
    pub deleted: bool,
}

impl TaskRecord {
    /// Create a new live task with the given id and title, stamped now
    #[must_use]
    pub fn new(id: TaskId, title: impl Into<String>) -> Self {
        let now = now_millis();
        Self {
            id,
            title: title.into(),
            description: String::new(),
            completed: false,
            priority: Priority::Normal,
            category_id: None,
            due_date: None,
            completed_date: None,
            created_date: now,
            modified_date: now,
            deleted: false,
        }
    }

    /// Set the category, treating `0` as uncategorized
    #[must_use]
    pub fn with_category(mut self, category_id: Option<i64>) -> Self {
        self.category_id = match category_id {
            Some(0) | None => None,
            Some(id) => Some(id),
        };
        self
    }

    /// Advance `modified_date` to now, or one millisecond past its previous value
    /// when the clock has not moved forward.
    pub fn touch(&mut self) {
        let floor = self.modified_date + Duration::milliseconds(1);
        self.modified_date = now_millis().max(floor);
    }

    /// Mark the task completed (or reopen it) and bump the modification instant
    pub fn set_completed(&mut self, completed: bool) {
        self.completed = completed;
        self.completed_date = if completed { Some(now_millis()) } else { None };
        self.touch();
    }

    /// Turn the task into a tombstone
    pub fn mark_deleted(&mut self) {
        self.deleted = true;
        self.touch();
    }

    /// Title with whitespace collapsed, for display
    #[must_use]
    pub fn title_preview(&self, max_len: usize) -> String {
        self.title
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .chars()
            .take(max_len)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_new() {
        let task = TaskRecord::new(TaskId::new(7), "Write report");
        assert_eq!(task.title, "Write report");
        assert!(!task.completed);
        assert!(!task.deleted);
        assert_eq!(task.priority, Priority::Normal);
        assert_eq!(task.created_date, task.modified_date);
    }

    #[test]
    fn test_touch_strictly_advances() {
        let mut task = TaskRecord::new(TaskId::new(1), "A");
        let far_future = task.modified_date + Duration::days(365);
        task.modified_date = far_future;

        task.touch();
        assert_eq!(task.modified_date, far_future + Duration::milliseconds(1));
    }

    #[test]
    fn test_set_completed_sets_and_clears_completed_date() {
        let mut task = TaskRecord::new(TaskId::new(1), "A");
        let before = task.modified_date;

        task.set_completed(true);
        assert!(task.completed);
        assert!(task.completed_date.is_some());
        assert!(task.modified_date > before);

        task.set_completed(false);
        assert!(!task.completed);
        assert!(task.completed_date.is_none());
    }

    #[test]
    fn test_mark_deleted_bumps_modified_date() {
        let mut task = TaskRecord::new(TaskId::new(1), "A");
        let before = task.modified_date;
        task.mark_deleted();
        assert!(task.deleted);
        assert!(task.modified_date > before);
    }

    #[test]
    fn test_with_category_treats_zero_as_none() {
        let task = TaskRecord::new(TaskId::new(1), "A").with_category(Some(0));
        assert_eq!(task.category_id, None);
        let task = task.with_category(Some(4));
        assert_eq!(task.category_id, Some(4));
    }

    #[test]
    fn test_priority_ordinals() {
        for priority in [Priority::Low, Priority::Normal, Priority::High] {
            assert_eq!(Priority::from_ordinal(priority.ordinal()), Some(priority));
        }
        assert_eq!(Priority::from_ordinal(3), None);
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn test_task_id_parse() {
        let id: TaskId = " 42 ".parse().unwrap();
        assert_eq!(id, TaskId::new(42));
        assert!("abc".parse::<TaskId>().is_err());
    }

    #[test]
    fn test_title_preview() {
        let task = TaskRecord::new(TaskId::new(1), "Buy   milk\nand eggs");
        assert_eq!(task.title_preview(50), "Buy milk and eggs");
        assert_eq!(task.title_preview(3), "Buy");
    }
}
