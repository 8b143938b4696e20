//! Last-writer-wins reconciliation of two task snapshots.
//!
//! The result is the key-union of both inputs. For an id present on both
//! sides the record with the strictly later `modified_date` survives. When the
//! instants are equal and the content differs, the record whose content sorts
//! greater under [`content_order`] wins, regardless of which side it came from.
//! That makes [`merge`] a join: idempotent, commutative and associative, so
//! repeated or interrupted syncs converge on the same state.
//!
//! Absence is never deletion. Deletions travel as tombstone records
//! (`TaskRecord::deleted`) and compete like any other edit.

use std::cmp::Ordering;

use crate::models::{ConflictSide, Snapshot, SyncConflict, TaskRecord};

/// Result of reconciling a local snapshot against a remote one
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Merged snapshot, the new state for both replicas
    pub merged: Snapshot,
    /// Records the local store must upsert to match `merged`
    pub local_changes: Vec<TaskRecord>,
    /// Ids present on both sides with diverging content
    pub conflicts: Vec<SyncConflict>,
}

impl MergeOutcome {
    /// True when the remote copy already equals the merged state
    #[must_use]
    pub fn remote_is_current(&self, remote: &Snapshot) -> bool {
        &self.merged == remote
    }
}

/// Merge two snapshots, keeping the newer record per id
#[must_use]
pub fn merge(local: &Snapshot, remote: &Snapshot) -> Snapshot {
    reconcile(local, remote).merged
}

/// Merge two snapshots and describe the local mutations and conflicts involved
#[must_use]
pub fn reconcile(local: &Snapshot, remote: &Snapshot) -> MergeOutcome {
    let mut merged = local.clone();
    let mut local_changes = Vec::new();
    let mut conflicts = Vec::new();

    for remote_record in remote.records() {
        let Some(local_record) = local.get(remote_record.id) else {
            merged.insert(remote_record.clone());
            local_changes.push(remote_record.clone());
            continue;
        };

        if local_record == remote_record {
            continue;
        }

        let winner = if supersedes(remote_record, local_record) {
            merged.insert(remote_record.clone());
            local_changes.push(remote_record.clone());
            ConflictSide::Remote
        } else {
            ConflictSide::Local
        };

        tracing::debug!(
            task_id = %remote_record.id,
            winner = winner.as_str(),
            "Resolved diverging task by last-writer-wins"
        );
        conflicts.push(SyncConflict {
            task_id: remote_record.id,
            local_modified: local_record.modified_date,
            remote_modified: remote_record.modified_date,
            winner,
        });
    }

    MergeOutcome {
        merged,
        local_changes,
        conflicts,
    }
}

/// Whether `candidate` replaces `incumbent` for the same id
#[must_use]
pub fn supersedes(candidate: &TaskRecord, incumbent: &TaskRecord) -> bool {
    match candidate.modified_date.cmp(&incumbent.modified_date) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => content_order(candidate, incumbent) == Ordering::Greater,
    }
}

/// Total order over record content, used only to break `modified_date` ties.
///
/// Tombstones sort above live records and completed above open, so a delete or
/// completion stamped in the same millisecond as an edit wins.
#[must_use]
pub fn content_order(a: &TaskRecord, b: &TaskRecord) -> Ordering {
    a.deleted
        .cmp(&b.deleted)
        .then_with(|| a.completed.cmp(&b.completed))
        .then_with(|| a.completed_date.cmp(&b.completed_date))
        .then_with(|| a.priority.cmp(&b.priority))
        .then_with(|| a.title.cmp(&b.title))
        .then_with(|| a.description.cmp(&b.description))
        .then_with(|| a.category_id.cmp(&b.category_id))
        .then_with(|| a.due_date.cmp(&b.due_date))
        .then_with(|| a.created_date.cmp(&b.created_date))
}
