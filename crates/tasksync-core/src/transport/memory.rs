//! In-process remote used by tests and dry runs.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{path_segments, RemoteTransport, TransportConnector, TransportError, TransportResult};
use crate::models::RemoteCredentials;

/// Transport operation, for call counting and failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operation {
    EnsureCollection,
    Exists,
    Fetch,
    Store,
}

#[derive(Debug, Default)]
struct MemoryState {
    collections: BTreeSet<String>,
    objects: BTreeMap<String, Vec<u8>>,
    calls: BTreeMap<Operation, usize>,
    failing: BTreeSet<Operation>,
    connects: usize,
}

/// Shared in-memory remote. Clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of calls made for one operation
    #[must_use]
    pub fn calls(&self, operation: Operation) -> usize {
        self.state().calls.get(&operation).copied().unwrap_or_default()
    }

    /// Number of calls across all operations
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.state().calls.values().sum()
    }

    /// Number of times a connector built this transport
    #[must_use]
    pub fn connects(&self) -> usize {
        self.state().connects
    }

    /// Make every call of `operation` fail until [`Self::clear_failures`]
    pub fn fail(&self, operation: Operation) {
        self.state().failing.insert(operation);
    }

    pub fn clear_failures(&self) {
        self.state().failing.clear();
    }

    /// Place an object directly, bypassing counters
    pub fn put_object(&self, path: &str, bytes: impl Into<Vec<u8>>) {
        self.state().objects.insert(normalize(path), bytes.into());
    }

    /// Read an object directly, bypassing counters
    #[must_use]
    pub fn object(&self, path: &str) -> Option<Vec<u8>> {
        self.state().objects.get(&normalize(path)).cloned()
    }

    #[must_use]
    pub fn has_collection(&self, path: &str) -> bool {
        self.state().collections.contains(&normalize(path))
    }

    fn begin(
        &self,
        operation: Operation,
        path: &str,
    ) -> TransportResult<(MutexGuard<'_, MemoryState>, String)> {
        let key = path_segments(path)?.join("/");
        let mut state = self.state();
        *state.calls.entry(operation).or_default() += 1;
        if state.failing.contains(&operation) {
            return Err(TransportError::Unavailable(format!(
                "injected {operation:?} failure for {key}"
            )));
        }
        Ok((state, key))
    }
}

fn normalize(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

impl RemoteTransport for MemoryTransport {
    async fn ensure_collection(&self, collection: &str) -> TransportResult<()> {
        let (mut state, key) = self.begin(Operation::EnsureCollection, collection)?;
        state.collections.insert(key);
        Ok(())
    }

    async fn exists(&self, object: &str) -> TransportResult<bool> {
        let (state, key) = self.begin(Operation::Exists, object)?;
        Ok(state.objects.contains_key(&key))
    }

    async fn fetch(&self, object: &str) -> TransportResult<Vec<u8>> {
        let (state, key) = self.begin(Operation::Fetch, object)?;
        state
            .objects
            .get(&key)
            .cloned()
            .ok_or(TransportError::NotFound(key))
    }

    async fn store(&self, object: &str, bytes: &[u8]) -> TransportResult<()> {
        let (mut state, key) = self.begin(Operation::Store, object)?;
        if let Some((parent, _)) = key.rsplit_once('/') {
            if !state.collections.contains(parent) {
                return Err(TransportError::NotFound(parent.to_string()));
            }
        }
        state.objects.insert(key, bytes.to_vec());
        Ok(())
    }
}

impl TransportConnector for MemoryTransport {
    type Transport = Self;

    fn connect(&self, _credentials: &RemoteCredentials) -> TransportResult<Self> {
        self.state().connects += 1;
        Ok(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn counts_calls_and_shares_state_across_clones() {
        let transport = MemoryTransport::new();
        let handle = transport.clone();

        transport.ensure_collection("TaskSync").await.unwrap();
        assert!(!transport.exists("TaskSync/tasks.json").await.unwrap());
        transport.store("TaskSync/tasks.json", b"[]").await.unwrap();

        assert_eq!(handle.object("TaskSync/tasks.json"), Some(b"[]".to_vec()));
        assert_eq!(handle.calls(Operation::Exists), 1);
        assert_eq!(handle.calls(Operation::Fetch), 0);
        assert_eq!(handle.total_calls(), 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn injected_failure_keeps_previous_object() {
        let transport = MemoryTransport::new();
        transport.ensure_collection("TaskSync").await.unwrap();
        transport.store("TaskSync/tasks.json", b"[1]").await.unwrap();

        transport.fail(Operation::Store);
        assert!(matches!(
            transport.store("TaskSync/tasks.json", b"[2]").await,
            Err(TransportError::Unavailable(_))
        ));
        assert_eq!(transport.object("TaskSync/tasks.json"), Some(b"[1]".to_vec()));

        transport.clear_failures();
        transport.store("TaskSync/tasks.json", b"[2]").await.unwrap();
        assert_eq!(transport.object("TaskSync/tasks.json"), Some(b"[2]".to_vec()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn fetch_missing_and_store_without_collection() {
        let transport = MemoryTransport::new();
        assert!(matches!(
            transport.fetch("TaskSync/tasks.json").await,
            Err(TransportError::NotFound(_))
        ));
        assert!(matches!(
            transport.store("TaskSync/tasks.json", b"[]").await,
            Err(TransportError::NotFound(_))
        ));
    }
}
