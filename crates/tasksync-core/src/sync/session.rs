//! One sync attempt against one remote.

use chrono::{DateTime, Utc};

use crate::codec::{decode_snapshot, encode_snapshot};
use crate::models::{RemoteCredentials, Snapshot};
use crate::transport::{RemoteLayout, RemoteTransport, TransportResult};
use crate::util::now_millis;

/// What the remote held when the session looked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteSnapshotState {
    /// No snapshot object yet
    Absent,
    /// Snapshot fetched and decoded
    Loaded,
    /// Snapshot present but undecodable; ignored for this run
    Unreadable,
}

/// Ephemeral state of one sync attempt.
///
/// Created once credentials are resolved and dropped when the attempt ends;
/// only the completion instant outlives it, through the settings store.
#[derive(Debug)]
pub struct SyncSession<T> {
    credentials: RemoteCredentials,
    layout: RemoteLayout,
    transport: T,
    started_at: DateTime<Utc>,
    last_completed_at: Option<DateTime<Utc>>,
}

impl<T: RemoteTransport> SyncSession<T> {
    pub fn new(
        credentials: RemoteCredentials,
        layout: RemoteLayout,
        transport: T,
        last_completed_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            credentials,
            layout,
            transport,
            started_at: now_millis(),
            last_completed_at,
        }
    }

    pub async fn ensure_remote(&self) -> TransportResult<()> {
        self.transport.ensure_collection(&self.layout.collection).await
    }

    /// Fetch and decode the remote snapshot.
    ///
    /// An undecodable payload yields an empty snapshot so the run can continue
    /// from local state; transport failures propagate.
    pub async fn fetch_remote(&self) -> TransportResult<(RemoteSnapshotState, Snapshot)> {
        let object = self.layout.object_path();
        if !self.transport.exists(&object).await? {
            match self.last_completed_at {
                Some(previous) => tracing::warn!(
                    "No remote snapshot at {object} on {} although a sync completed at {previous}; it will be recreated",
                    self.credentials.base_url
                ),
                None => tracing::info!(
                    "No remote snapshot at {object}; first sync for {}",
                    self.credentials.base_url
                ),
            }
            return Ok((RemoteSnapshotState::Absent, Snapshot::new()));
        }

        let bytes = self.transport.fetch(&object).await?;
        match decode_snapshot(&bytes) {
            Ok(snapshot) => {
                tracing::debug!("Fetched remote snapshot with {} records", snapshot.len());
                Ok((RemoteSnapshotState::Loaded, snapshot))
            }
            Err(error) => {
                tracing::warn!(
                    "Remote snapshot at {object} is unreadable ({error}); continuing with local data only"
                );
                Ok((RemoteSnapshotState::Unreadable, Snapshot::new()))
            }
        }
    }

    pub async fn upload(&self, snapshot: &Snapshot) -> TransportResult<()> {
        let object = self.layout.object_path();
        let bytes = encode_snapshot(snapshot);
        self.transport.store(&object, &bytes).await?;
        tracing::debug!(
            "Uploaded {} records ({} bytes) to {object} on {}, {}ms into the session",
            snapshot.len(),
            bytes.len(),
            self.credentials.base_url,
            (now_millis() - self.started_at).num_milliseconds()
        );
        Ok(())
    }
}
