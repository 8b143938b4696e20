use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;
use tempfile::tempdir;
use tokio::sync::Notify;

use super::*;
use crate::codec::{decode_snapshot, encode_snapshot};
use crate::db::TaskFilter;
use crate::merge::merge;
use crate::models::{
    ConflictSide, NewTask, RemoteCredentials, Snapshot, SyncSettings, TaskId, TaskRecord,
};
use crate::services::DatabaseService;
use crate::transport::{
    Connector, MemoryTransport, NetworkProbe, Operation, RemoteLayout, RemoteTransport,
    TransportConnector, TransportResult,
};

const OBJECT: &str = "TaskSync/tasks.json";

fn at(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(1_700_000_000_000).unwrap() + Duration::seconds(seconds)
}

fn record(id: i64, title: &str, modified: i64) -> TaskRecord {
    TaskRecord {
        created_date: at(0),
        modified_date: at(modified),
        ..TaskRecord::new(TaskId::new(id), title)
    }
}

fn snapshot(records: impl IntoIterator<Item = TaskRecord>) -> Snapshot {
    records.into_iter().collect()
}

fn remote_settings(remote_url: &str) -> SyncSettings {
    SyncSettings {
        remote_url: Some(remote_url.to_string()),
        username: Some("alice".to_string()),
        password: Some("secret".to_string()),
        ..SyncSettings::default()
    }
}

async fn store_with(records: &[TaskRecord]) -> DatabaseService {
    let store = DatabaseService::open_in_memory().unwrap();
    store
        .save_sync_settings(&remote_settings("https://dav.example.com/files/alice"))
        .await
        .unwrap();
    store.upsert_all(records).await.unwrap();
    store
}

fn remote_snapshot(remote: &MemoryTransport) -> Snapshot {
    decode_snapshot(&remote.object(OBJECT).expect("remote object should exist")).unwrap()
}

struct Offline;

impl NetworkProbe for Offline {
    async fn is_online(&self, _remote_url: Option<&str>) -> bool {
        false
    }
}

/// Transport whose `exists` waits for a signal before answering.
#[derive(Clone)]
struct GatedTransport {
    inner: MemoryTransport,
    gate: Arc<Notify>,
}

impl RemoteTransport for GatedTransport {
    async fn ensure_collection(&self, collection: &str) -> TransportResult<()> {
        self.inner.ensure_collection(collection).await
    }

    async fn exists(&self, object: &str) -> TransportResult<bool> {
        self.gate.notified().await;
        self.inner.exists(object).await
    }

    async fn fetch(&self, object: &str) -> TransportResult<Vec<u8>> {
        self.inner.fetch(object).await
    }

    async fn store(&self, object: &str, bytes: &[u8]) -> TransportResult<()> {
        self.inner.store(object, bytes).await
    }
}

impl TransportConnector for GatedTransport {
    type Transport = Self;

    fn connect(&self, _credentials: &RemoteCredentials) -> TransportResult<Self> {
        Ok(self.clone())
    }
}

/// Store that edits task 1 right before the first write-back lands.
#[derive(Clone)]
struct EditingStore {
    inner: DatabaseService,
    edited: Arc<AtomicBool>,
}

impl EditingStore {
    const EDITED_TITLE: &'static str = "edited during sync";
}

impl TaskStore for EditingStore {
    async fn get_all_records(&self) -> crate::Result<Snapshot> {
        self.inner.get_all_records().await
    }

    async fn upsert(&self, record: &TaskRecord) -> crate::Result<()> {
        self.inner.upsert(record).await
    }

    async fn upsert_all(&self, records: &[TaskRecord]) -> crate::Result<()> {
        if !self.edited.swap(true, Ordering::SeqCst) {
            let mut task = self
                .inner
                .get_task(TaskId::new(1))
                .await?
                .expect("task 1 exists");
            task.title = Self::EDITED_TITLE.to_string();
            self.inner.update_task(&task).await?;
        }
        self.inner.upsert_all(records).await
    }

    async fn record_conflicts(
        &self,
        conflicts: &[crate::models::SyncConflict],
        resolved_at: DateTime<Utc>,
    ) -> crate::Result<()> {
        self.inner.record_conflicts(conflicts, resolved_at).await
    }
}

impl SettingsStore for EditingStore {
    async fn load_sync_settings(&self) -> crate::Result<SyncSettings> {
        self.inner.load_sync_settings().await
    }

    async fn save_sync_settings(&self, settings: &SyncSettings) -> crate::Result<()> {
        self.inner.save_sync_settings(settings).await
    }

    async fn record_sync_completed(&self, at: DateTime<Utc>) -> crate::Result<()> {
        self.inner.record_sync_completed(at).await
    }
}

/// Transport that requests cancellation while checking for the remote object.
#[derive(Clone)]
struct CancellingTransport {
    inner: MemoryTransport,
    cancellation: CancellationFlag,
}

impl RemoteTransport for CancellingTransport {
    async fn ensure_collection(&self, collection: &str) -> TransportResult<()> {
        self.inner.ensure_collection(collection).await
    }

    async fn exists(&self, object: &str) -> TransportResult<bool> {
        self.cancellation.cancel();
        self.inner.exists(object).await
    }

    async fn fetch(&self, object: &str) -> TransportResult<Vec<u8>> {
        self.inner.fetch(object).await
    }

    async fn store(&self, object: &str, bytes: &[u8]) -> TransportResult<()> {
        self.inner.store(object, bytes).await
    }
}

impl TransportConnector for CancellingTransport {
    type Transport = Self;

    fn connect(&self, _credentials: &RemoteCredentials) -> TransportResult<Self> {
        Ok(self.clone())
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn first_sync_uploads_local_snapshot() {
    let local = vec![record(1, "A", 10)];
    let store = store_with(&local).await;
    let remote = MemoryTransport::new();
    let orchestrator = SyncOrchestrator::new(store.clone(), remote.clone());

    let report = orchestrator.sync().await.unwrap();

    assert_eq!(report.remote, RemoteSnapshotState::Absent);
    assert_eq!(report.local_changes, 0);
    assert_eq!(report.uploaded, 1);
    assert_eq!(remote_snapshot(&remote), snapshot(local.clone()));
    assert_eq!(store.get_all_records().await.unwrap(), snapshot(local));
    assert_eq!(remote.calls(Operation::Fetch), 0);
    assert!(remote.has_collection("TaskSync"));
    assert_eq!(orchestrator.status(), SyncStatus::Success);
}

#[tokio::test(flavor = "multi_thread")]
async fn custom_layout_places_snapshot_in_its_collection() {
    let local = vec![record(1, "A", 10)];
    let store = store_with(&local).await;
    let remote = MemoryTransport::new();
    let orchestrator =
        SyncOrchestrator::new(store, remote.clone()).with_layout(RemoteLayout {
            collection: "/Shared/".to_string(),
            object_name: "team.json".to_string(),
        });

    orchestrator.sync().await.unwrap();

    assert_eq!(orchestrator.layout().object_path(), "Shared/team.json");
    let uploaded = remote.object("Shared/team.json").expect("custom object");
    assert_eq!(decode_snapshot(&uploaded).unwrap(), snapshot(local));
    assert!(remote.object(OBJECT).is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn newer_remote_record_replaces_local() {
    let store = store_with(&[record(1, "local", 10)]).await;
    let newer = TaskRecord {
        description: "edited elsewhere".to_string(),
        ..record(1, "remote", 20)
    };
    let remote = MemoryTransport::new();
    remote.put_object(OBJECT, encode_snapshot(&snapshot([newer.clone()])));
    let orchestrator = SyncOrchestrator::new(store.clone(), remote.clone());

    let report = orchestrator.sync().await.unwrap();

    assert_eq!(report.remote, RemoteSnapshotState::Loaded);
    assert_eq!(report.local_changes, 1);
    assert_eq!(report.conflicts, 1);
    assert_eq!(store.get_all_records().await.unwrap(), snapshot([newer.clone()]));
    assert_eq!(remote_snapshot(&remote), snapshot([newer]));

    let conflicts = store.list_conflicts(10).await.unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].conflict.winner, ConflictSide::Remote);
    assert_eq!(conflicts[0].conflict.remote_modified, at(20));
}

#[tokio::test(flavor = "multi_thread")]
async fn local_edit_during_sync_survives_older_remote_winner() {
    let store = store_with(&[record(1, "local", 10)]).await;
    let remote = MemoryTransport::new();
    remote.put_object(OBJECT, encode_snapshot(&snapshot([record(1, "remote", 20)])));
    let editing = EditingStore {
        inner: store.clone(),
        edited: Arc::new(AtomicBool::new(false)),
    };
    let orchestrator = SyncOrchestrator::new(editing.clone(), remote.clone());

    let report = orchestrator.sync().await.unwrap();

    assert!(editing.edited.load(Ordering::SeqCst));
    assert_eq!(report.local_changes, 1);
    let local = store.get_all_records().await.unwrap();
    let kept = local.get(TaskId::new(1)).unwrap();
    assert_eq!(kept.title, EditingStore::EDITED_TITLE);
    // modifiedDate never moves backwards through the write-back.
    assert!(kept.modified_date > at(20));
    assert_eq!(remote_snapshot(&remote), local);

    // The next run has nothing left to reconcile.
    let next = orchestrator.sync().await.unwrap();
    assert_eq!(next.local_changes, 0);
    assert_eq!(next.conflicts, 0);
    assert_eq!(store.get_all_records().await.unwrap(), local);
}

#[tokio::test(flavor = "multi_thread")]
async fn modified_dates_never_move_backwards_on_either_side() {
    let local_before = snapshot([
        record(1, "local newer", 40),
        record(2, "local older", 10),
        record(3, "local only", 15),
    ]);
    let remote_before = snapshot([
        record(1, "remote older", 30),
        record(2, "remote newer", 50),
        record(4, "remote only", 25),
    ]);
    let store = store_with(&local_before.records().cloned().collect::<Vec<_>>()).await;
    let remote = MemoryTransport::new();
    remote.put_object(OBJECT, encode_snapshot(&remote_before));
    let orchestrator = SyncOrchestrator::new(store.clone(), remote.clone());

    orchestrator.sync().await.unwrap();

    let local_after = store.get_all_records().await.unwrap();
    let remote_after = remote_snapshot(&remote);
    assert_eq!(local_after, remote_after);
    assert_eq!(local_after.len(), 4);
    for before in local_before.records().chain(remote_before.records()) {
        let after = local_after.get(before.id).unwrap();
        assert!(
            after.modified_date >= before.modified_date,
            "task {} went from {} to {}",
            before.id,
            before.modified_date,
            after.modified_date
        );
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn newer_local_record_overwrites_remote() {
    let local = record(1, "local", 30);
    let store = store_with(&[local.clone()]).await;
    let remote = MemoryTransport::new();
    remote.put_object(OBJECT, encode_snapshot(&snapshot([record(1, "remote", 20)])));
    let orchestrator = SyncOrchestrator::new(store.clone(), remote.clone());

    let report = orchestrator.sync().await.unwrap();

    assert_eq!(report.local_changes, 0);
    assert_eq!(report.conflicts, 1);
    assert_eq!(remote_snapshot(&remote), snapshot([local]));
}

#[tokio::test(flavor = "multi_thread")]
async fn unreadable_remote_degrades_to_local_snapshot() {
    let local = vec![record(1, "A", 10), record(2, "B", 11)];
    let store = store_with(&local).await;
    let remote = MemoryTransport::new();
    remote.put_object(OBJECT, b"{ not a task list".to_vec());
    let orchestrator = SyncOrchestrator::new(store.clone(), remote.clone());

    let report = orchestrator.sync().await.unwrap();

    assert_eq!(report.remote, RemoteSnapshotState::Unreadable);
    assert_eq!(orchestrator.status(), SyncStatus::Success);
    assert_eq!(remote_snapshot(&remote), snapshot(local.clone()));
    assert_eq!(store.get_all_records().await.unwrap(), snapshot(local));
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_credentials_never_touch_transport() {
    let store = DatabaseService::open_in_memory().unwrap();
    let remote = MemoryTransport::new();
    let orchestrator = SyncOrchestrator::new(store, remote.clone());

    let error = orchestrator.sync().await.unwrap_err();

    match &error {
        SyncError::MissingCredentials(missing) => {
            assert_eq!(missing, &vec!["remote_url", "username", "password"]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(orchestrator.status(), SyncStatus::ErrorNoCredentials);
    assert_eq!(remote.total_calls(), 0);
    assert_eq!(remote.connects(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn offline_never_touches_transport() {
    let store = store_with(&[record(1, "A", 10)]).await;
    let remote = MemoryTransport::new();
    let orchestrator = SyncOrchestrator::with_probe(store, remote.clone(), Offline);

    assert!(matches!(
        orchestrator.sync().await,
        Err(SyncError::NoNetwork)
    ));
    assert_eq!(orchestrator.status(), SyncStatus::ErrorNoNetwork);
    assert_eq!(remote.total_calls(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_upload_keeps_local_merge_and_retry_converges() {
    let local = vec![record(1, "local", 10), record(3, "only local", 12)];
    let remote_records = vec![record(1, "remote", 20), record(2, "only remote", 5)];
    let expected = merge(&snapshot(local.clone()), &snapshot(remote_records.clone()));

    let store = store_with(&local).await;
    let remote = MemoryTransport::new();
    remote.put_object(OBJECT, encode_snapshot(&snapshot(remote_records.clone())));
    remote.fail(Operation::Store);
    let orchestrator = SyncOrchestrator::new(store.clone(), remote.clone());

    let error = orchestrator.sync().await.unwrap_err();
    assert!(matches!(error, SyncError::Transport(_)));
    assert_eq!(orchestrator.status(), SyncStatus::ErrorSyncFailed);
    assert_eq!(store.get_all_records().await.unwrap(), expected);
    assert_eq!(remote_snapshot(&remote), snapshot(remote_records.clone()));
    assert!(orchestrator.last_success().is_none());

    remote.clear_failures();
    orchestrator.sync().await.unwrap();
    assert_eq!(orchestrator.status(), SyncStatus::Success);

    // Same end state as a pair that never saw the failure.
    let clean_store = store_with(&local).await;
    let clean_remote = MemoryTransport::new();
    clean_remote.put_object(OBJECT, encode_snapshot(&snapshot(remote_records)));
    SyncOrchestrator::new(clean_store.clone(), clean_remote.clone())
        .sync()
        .await
        .unwrap();

    assert_eq!(store.get_all_records().await.unwrap(), expected);
    assert_eq!(remote_snapshot(&remote), expected);
    assert_eq!(clean_store.get_all_records().await.unwrap(), expected);
    assert_eq!(remote_snapshot(&clean_remote), expected);
}

#[tokio::test(flavor = "multi_thread")]
async fn repeated_sync_is_a_no_op() {
    let store = store_with(&[record(1, "A", 10)]).await;
    let remote = MemoryTransport::new();
    remote.put_object(OBJECT, encode_snapshot(&snapshot([record(2, "B", 10)])));
    let orchestrator = SyncOrchestrator::new(store.clone(), remote.clone());

    orchestrator.sync().await.unwrap();
    let after_first = store.get_all_records().await.unwrap();
    let second = orchestrator.sync().await.unwrap();

    assert_eq!(second.local_changes, 0);
    assert_eq!(second.conflicts, 0);
    assert_eq!(store.get_all_records().await.unwrap(), after_first);
    assert_eq!(remote_snapshot(&remote), after_first);
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_sync_is_rejected() {
    let store = store_with(&[record(1, "A", 10)]).await;
    let gate = Arc::new(Notify::new());
    let transport = GatedTransport {
        inner: MemoryTransport::new(),
        gate: gate.clone(),
    };
    let orchestrator = SyncOrchestrator::new(store, transport.clone());

    let first = orchestrator.sync();
    let second = async {
        while orchestrator.status() != SyncStatus::Syncing {
            tokio::task::yield_now().await;
        }
        assert!(orchestrator.is_running());
        let result = orchestrator.sync().await;
        let status_while_running = orchestrator.status();
        gate.notify_one();
        (result, status_while_running)
    };
    let (first, (second, status_while_running)) = tokio::join!(first, second);

    assert!(first.is_ok());
    assert!(matches!(second, Err(SyncError::AlreadyRunning)));
    assert_eq!(status_while_running, SyncStatus::Syncing);
    assert_eq!(orchestrator.status(), SyncStatus::Success);
    assert_eq!(transport.inner.calls(Operation::Store), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn cancellation_stops_before_next_phase() {
    let store = store_with(&[record(1, "A", 10)]).await;
    let cancellation = CancellationFlag::new();
    let transport = CancellingTransport {
        inner: MemoryTransport::new(),
        cancellation: cancellation.clone(),
    };
    let orchestrator =
        SyncOrchestrator::new(store, transport.clone()).with_cancellation(cancellation);

    assert!(matches!(
        orchestrator.sync().await,
        Err(SyncError::Cancelled)
    ));
    assert_eq!(orchestrator.status(), SyncStatus::ErrorSyncFailed);
    assert_eq!(transport.inner.calls(Operation::Exists), 1);
    assert_eq!(transport.inner.calls(Operation::Fetch), 0);
    assert_eq!(transport.inner.calls(Operation::Store), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn status_transitions_are_published_in_order() {
    let store = store_with(&[record(1, "A", 10)]).await;
    let remote = MemoryTransport::new();
    let orchestrator = SyncOrchestrator::new(store.clone(), remote.clone());
    let mut events = orchestrator.subscribe();
    let mut current = orchestrator.watch_status();
    assert_eq!(*current.borrow_and_update(), SyncStatus::Idle);

    orchestrator.sync().await.unwrap();
    assert!(current.has_changed().unwrap());
    assert_eq!(*current.borrow_and_update(), SyncStatus::Success);
    remote.fail(Operation::EnsureCollection);
    orchestrator.sync().await.unwrap_err();
    assert_eq!(*current.borrow(), SyncStatus::ErrorSyncFailed);

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event.status);
    }
    assert_eq!(
        seen,
        vec![
            SyncStatus::Syncing,
            SyncStatus::Success,
            SyncStatus::Idle,
            SyncStatus::Syncing,
            SyncStatus::ErrorSyncFailed,
        ]
    );

    let persisted = store.load_sync_settings().await.unwrap();
    assert_eq!(persisted.last_sync_completed_at, orchestrator.last_success());
    assert!(persisted.last_sync_completed_at.is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn unsupported_remote_address_fails_the_run() {
    let store = DatabaseService::open_in_memory().unwrap();
    store
        .save_sync_settings(&remote_settings("ftp://files.example.com"))
        .await
        .unwrap();
    let orchestrator = SyncOrchestrator::new(store, Connector::new());

    assert!(matches!(
        orchestrator.sync().await,
        Err(SyncError::Transport(_))
    ));
    assert_eq!(orchestrator.status(), SyncStatus::ErrorSyncFailed);
}

#[tokio::test(flavor = "multi_thread")]
async fn two_devices_converge_through_directory_remote() {
    let remote_dir = tempdir().unwrap();
    let remote_url = format!("file://{}", remote_dir.path().display());

    let laptop = DatabaseService::open_in_memory().unwrap();
    let phone = DatabaseService::open_in_memory().unwrap();
    for device in [&laptop, &phone] {
        device
            .save_sync_settings(&remote_settings(&remote_url))
            .await
            .unwrap();
    }
    let laptop_sync = SyncOrchestrator::new(laptop.clone(), Connector::new());
    let phone_sync = SyncOrchestrator::new(phone.clone(), Connector::new());

    let groceries = laptop
        .create_task(&NewTask::titled("Buy groceries"))
        .await
        .unwrap();
    laptop
        .create_task(&NewTask::titled("Call the plumber"))
        .await
        .unwrap();
    laptop_sync.sync().await.unwrap();

    phone_sync.sync().await.unwrap();
    let report = phone
        .create_task(&NewTask::titled("File the report"))
        .await
        .unwrap();
    assert!(report.id > groceries.id);
    phone.delete_task(groceries.id).await.unwrap();
    phone_sync.sync().await.unwrap();

    laptop_sync.sync().await.unwrap();

    let laptop_records = laptop.get_all_records().await.unwrap();
    assert_eq!(laptop_records, phone.get_all_records().await.unwrap());
    assert_eq!(laptop_records.len(), 3);
    assert!(laptop.get_task(groceries.id).await.unwrap().is_none());

    let titles: Vec<String> = laptop
        .list_tasks(TaskFilter::All, 10, 0)
        .await
        .unwrap()
        .into_iter()
        .map(|task| task.title)
        .collect();
    assert_eq!(titles, vec!["Call the plumber", "File the report"]);

    let uploaded = std::fs::read(remote_dir.path().join("TaskSync").join("tasks.json")).unwrap();
    assert_eq!(decode_snapshot(&uploaded).unwrap(), laptop_records);
}

#[tokio::test(flavor = "multi_thread")]
async fn auto_sync_runs_until_max_ticks() {
    let store = store_with(&[record(1, "A", 10)]).await;
    let mut settings = store.load_sync_settings().await.unwrap();
    settings.auto_sync_enabled = true;
    store.save_sync_settings(&settings).await.unwrap();

    let remote = MemoryTransport::new();
    let orchestrator = SyncOrchestrator::new(store, remote.clone());
    let summary = AutoSync::new(std::time::Duration::from_millis(10))
        .with_max_ticks(3)
        .run(&orchestrator, std::future::pending())
        .await;

    assert_eq!(summary.ticks, 3);
    assert_eq!(summary.successes, 3);
    assert_eq!(remote.calls(Operation::Store), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn auto_sync_skips_when_disabled_and_stops_on_shutdown() {
    let store = store_with(&[record(1, "A", 10)]).await;
    let remote = MemoryTransport::new();
    let orchestrator = SyncOrchestrator::new(store, remote.clone());

    let summary = AutoSync::new(std::time::Duration::from_millis(10))
        .run(
            &orchestrator,
            tokio::time::sleep(std::time::Duration::from_millis(200)),
        )
        .await;

    assert!(summary.ticks >= 1);
    assert_eq!(summary.skipped, summary.ticks);
    assert_eq!(remote.total_calls(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn auto_sync_counts_failures_and_keeps_going() {
    let store = store_with(&[record(1, "A", 10)]).await;
    let mut settings = store.load_sync_settings().await.unwrap();
    settings.auto_sync_enabled = true;
    store.save_sync_settings(&settings).await.unwrap();

    let remote = MemoryTransport::new();
    remote.fail(Operation::Store);
    let orchestrator = SyncOrchestrator::new(store, remote.clone());
    let summary = AutoSync::new(std::time::Duration::from_millis(5))
        .with_max_ticks(2)
        .run(&orchestrator, std::future::pending())
        .await;

    assert_eq!(summary.failures, 2);
    assert_eq!(orchestrator.status(), SyncStatus::ErrorSyncFailed);
}
