//! Snapshot model: the full task collection of one replica at one instant

use std::collections::btree_map::{self, BTreeMap};

use thiserror::Error;

use super::{TaskId, TaskRecord};

/// Raised when a record list contains the same id twice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("duplicate task id {0} in snapshot")]
pub struct DuplicateTaskId(pub TaskId);

/// A set of task records keyed by id
///
/// Ordering is irrelevant to the model; the map keeps iteration deterministic
/// so encoded snapshots are byte-stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    records: BTreeMap<TaskId, TaskRecord>,
}

impl Snapshot {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            records: BTreeMap::new(),
        }
    }

    /// Build a snapshot, rejecting duplicate ids
    pub fn try_from_records(
        records: impl IntoIterator<Item = TaskRecord>,
    ) -> Result<Self, DuplicateTaskId> {
        let mut snapshot = Self::new();
        for record in records {
            let id = record.id;
            if snapshot.insert(record).is_some() {
                return Err(DuplicateTaskId(id));
            }
        }
        Ok(snapshot)
    }

    /// Insert or replace a record, returning the previous one
    pub fn insert(&mut self, record: TaskRecord) -> Option<TaskRecord> {
        self.records.insert(record.id, record)
    }

    #[must_use]
    pub fn get(&self, id: TaskId) -> Option<&TaskRecord> {
        self.records.get(&id)
    }

    #[must_use]
    pub fn contains(&self, id: TaskId) -> bool {
        self.records.contains_key(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Ids in ascending order
    pub fn ids(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.records.keys().copied()
    }

    /// Records in ascending id order
    pub fn records(&self) -> btree_map::Values<'_, TaskId, TaskRecord> {
        self.records.values()
    }

    /// Number of live (non-tombstone) records
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.records.values().filter(|record| !record.deleted).count()
    }
}

impl FromIterator<TaskRecord> for Snapshot {
    /// Later records replace earlier ones with the same id.
    fn from_iter<I: IntoIterator<Item = TaskRecord>>(iter: I) -> Self {
        let mut snapshot = Self::new();
        for record in iter {
            snapshot.insert(record);
        }
        snapshot
    }
}

impl IntoIterator for Snapshot {
    type Item = TaskRecord;
    type IntoIter = btree_map::IntoValues<TaskId, TaskRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_values()
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a TaskRecord;
    type IntoIter = btree_map::Values<'a, TaskId, TaskRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.values()
    }
}
