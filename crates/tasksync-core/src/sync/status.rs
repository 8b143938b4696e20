//! Observable sync status.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};

use crate::util::now_millis;

const EVENT_CAPACITY: usize = 64;

/// State of the sync orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    #[default]
    Idle,
    Syncing,
    Success,
    ErrorNoNetwork,
    ErrorNoCredentials,
    ErrorSyncFailed,
}

impl SyncStatus {
    /// Whether a run has ended in this state
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Idle | Self::Syncing)
    }

    #[must_use]
    pub const fn is_error(self) -> bool {
        matches!(
            self,
            Self::ErrorNoNetwork | Self::ErrorNoCredentials | Self::ErrorSyncFailed
        )
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Syncing => "syncing",
            Self::Success => "success",
            Self::ErrorNoNetwork => "error_no_network",
            Self::ErrorNoCredentials => "error_no_credentials",
            Self::ErrorSyncFailed => "error_sync_failed",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One status transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub status: SyncStatus,
    pub at: DateTime<Utc>,
}

/// Publishes status transitions.
///
/// The current value and last success instant can be polled through
/// `watch` receivers; every transition is also broadcast in order.
#[derive(Debug)]
pub struct StatusBoard {
    current: watch::Sender<SyncStatus>,
    last_success: watch::Sender<Option<DateTime<Utc>>>,
    events: broadcast::Sender<StatusEvent>,
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusBoard {
    #[must_use]
    pub fn new() -> Self {
        let (current, _) = watch::channel(SyncStatus::Idle);
        let (last_success, _) = watch::channel(None);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            current,
            last_success,
            events,
        }
    }

    #[must_use]
    pub fn current(&self) -> SyncStatus {
        *self.current.borrow()
    }

    #[must_use]
    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        *self.last_success.borrow()
    }

    /// Receiver that always sees the latest status
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<SyncStatus> {
        self.current.subscribe()
    }

    /// Receiver of every transition published from now on
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.events.subscribe()
    }

    pub(crate) fn publish(&self, status: SyncStatus) {
        self.current.send_replace(status);
        // No subscribers is fine.
        let _ = self.events.send(StatusEvent {
            status,
            at: now_millis(),
        });
        tracing::debug!(status = status.as_str(), "Sync status changed");
    }

    pub(crate) fn record_success(&self, at: DateTime<Utc>) {
        self.last_success.send_replace(Some(at));
    }

    /// Adopt a persisted success instant unless a newer one is known
    pub(crate) fn seed_last_success(&self, at: Option<DateTime<Utc>>) {
        self.last_success.send_if_modified(|current| {
            if at > *current {
                *current = at;
                true
            } else {
                false
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn terminal_states() {
        assert!(!SyncStatus::Idle.is_terminal());
        assert!(!SyncStatus::Syncing.is_terminal());
        assert!(SyncStatus::Success.is_terminal());
        assert!(!SyncStatus::Success.is_error());
        assert!(SyncStatus::ErrorNoCredentials.is_terminal());
        assert!(SyncStatus::ErrorSyncFailed.is_error());
    }

    #[test]
    fn publish_updates_watchers_and_broadcasts_in_order() {
        let board = StatusBoard::new();
        let watcher = board.watch();
        let mut events = board.subscribe();

        board.publish(SyncStatus::Syncing);
        board.publish(SyncStatus::Success);

        assert_eq!(*watcher.borrow(), SyncStatus::Success);
        assert_eq!(board.current(), SyncStatus::Success);
        assert_eq!(events.try_recv().unwrap().status, SyncStatus::Syncing);
        assert_eq!(events.try_recv().unwrap().status, SyncStatus::Success);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn seed_keeps_newest_success() {
        let board = StatusBoard::new();
        let older = Utc.timestamp_millis_opt(1_000).unwrap();
        let newer = Utc.timestamp_millis_opt(2_000).unwrap();

        board.seed_last_success(Some(older));
        assert_eq!(board.last_success(), Some(older));

        board.record_success(newer);
        board.seed_last_success(Some(older));
        board.seed_last_success(None);
        assert_eq!(board.last_success(), Some(newer));
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&SyncStatus::ErrorNoNetwork).unwrap(),
            "\"error_no_network\""
        );
        assert_eq!(SyncStatus::ErrorSyncFailed.to_string(), "error_sync_failed");
    }
}
