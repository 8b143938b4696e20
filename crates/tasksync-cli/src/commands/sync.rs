use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tasksync_core::export::summarize;
use tasksync_core::sync::{
    AutoSync, AutoSyncSummary, RemoteSnapshotState, SettingsStore, SyncOrchestrator, SyncReport,
    TaskStore,
};
use tasksync_core::transport::{Connector, TcpProbe};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Notify;

use crate::commands::common::{
    format_sync_conflict_lines, format_sync_timestamp, open_database, sync_conflict_to_item,
    EnvCredentialsStore, SyncConflictItem,
};
use crate::error::CliError;

const REMOTE_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
pub struct SyncStatusItem {
    pub configured: bool,
    pub remote_url: Option<String>,
    pub auto_sync_enabled: bool,
    pub auto_sync_interval_secs: u64,
    pub last_sync_completed_at: Option<String>,
    pub local: String,
}

fn build_orchestrator(
    db_path: &Path,
) -> Result<SyncOrchestrator<EnvCredentialsStore, Connector, TcpProbe>, CliError> {
    let store = EnvCredentialsStore::from_env(open_database(db_path)?)?;
    Ok(SyncOrchestrator::with_probe(
        store,
        Connector::new().with_timeout(REMOTE_REQUEST_TIMEOUT),
        TcpProbe::default(),
    ))
}

pub async fn run_sync(db_path: &Path) -> Result<SyncReport, CliError> {
    let orchestrator = build_orchestrator(db_path)?;
    let report = orchestrator.sync().await?;

    match report.remote {
        RemoteSnapshotState::Absent => println!("Remote was empty; uploaded local tasks"),
        RemoteSnapshotState::Unreadable => {
            println!("Remote snapshot was unreadable; replaced it with local tasks");
        }
        RemoteSnapshotState::Loaded => {}
    }
    println!(
        "Sync completed with {}: {} pulled, {} conflicts, {} uploaded",
        orchestrator.layout().object_path(),
        report.local_changes,
        report.conflicts,
        report.uploaded
    );
    Ok(report)
}

pub async fn run_sync_status(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let store = EnvCredentialsStore::from_env(open_database(db_path)?)?;
    let settings = store.load_sync_settings().await?;
    let snapshot = store.get_all_records().await?;

    let item = SyncStatusItem {
        configured: settings.credentials().is_ok(),
        remote_url: settings.remote_url.clone(),
        auto_sync_enabled: settings.auto_sync_enabled,
        auto_sync_interval_secs: settings.auto_sync_interval_secs,
        last_sync_completed_at: settings.last_sync_completed_at.map(format_sync_timestamp),
        local: summarize(&snapshot),
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&item)?);
        return Ok(());
    }

    match item.remote_url.as_deref() {
        Some(url) if item.configured => println!("Remote:     {url}"),
        Some(url) => println!("Remote:     {url} (incomplete credentials)"),
        None => println!("Remote:     not configured"),
    }
    println!(
        "Auto-sync:  {} (every {}s)",
        if item.auto_sync_enabled { "on" } else { "off" },
        item.auto_sync_interval_secs
    );
    println!(
        "Last sync:  {}",
        item.last_sync_completed_at.as_deref().unwrap_or("never")
    );
    println!("Local:      {}", item.local);
    Ok(())
}

pub async fn run_sync_conflicts(
    limit: usize,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let conflicts = db.list_conflicts(limit).await?;

    if as_json {
        let json_items = conflicts
            .iter()
            .map(sync_conflict_to_item)
            .collect::<Vec<SyncConflictItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if conflicts.is_empty() {
        println!("No sync conflicts recorded.");
        return Ok(());
    }

    for line in format_sync_conflict_lines(&conflicts) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_sync_watch(
    interval_secs: Option<u64>,
    db_path: &Path,
) -> Result<AutoSyncSummary, CliError> {
    let orchestrator = build_orchestrator(db_path)?;
    let settings = orchestrator.store().load_sync_settings().await?;
    if !settings.auto_sync_enabled {
        return Err(CliError::AutoSyncDisabled);
    }

    let interval = interval_secs.map_or_else(
        || settings.auto_sync_interval(),
        |secs| Duration::from_secs(secs.max(1)),
    );

    let mut events = orchestrator.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) if event.status.is_terminal() => {
                    println!("{}  {}", format_sync_timestamp(event.at), event.status);
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!("Status printer skipped {skipped} events");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // Ctrl-C stops the schedule and cancels a run that is already in flight.
    let stop = Arc::new(Notify::new());
    let interrupt = {
        let stop = Arc::clone(&stop);
        let cancellation = orchestrator.cancellation();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancellation.cancel();
                stop.notify_one();
            }
        })
    };

    let schedule = AutoSync::new(interval);
    println!(
        "Syncing every {}s. Press Ctrl-C to stop.",
        schedule.interval().as_secs()
    );
    let summary = schedule.run(&orchestrator, stop.notified()).await;

    interrupt.abort();
    drop(orchestrator);
    if let Err(error) = printer.await {
        tracing::debug!("Status printer ended abnormally: {error}");
    }

    println!(
        "Stopped after {} runs: {} succeeded, {} failed, {} skipped",
        summary.ticks, summary.successes, summary.failures, summary.skipped
    );
    Ok(summary)
}
