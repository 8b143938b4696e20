use std::path::Path;

use tasksync_core::export::read_export;
use tasksync_core::sync::TaskStore;
use tasksync_core::util::now_millis;
use tasksync_core::{reconcile, MergeOutcome};

use crate::commands::common::open_database;
use crate::error::CliError;

/// Merge an export into the local store with the same rules as a sync.
pub async fn run_import(path: &Path, db_path: &Path) -> Result<MergeOutcome, CliError> {
    let imported = read_export(path)?;
    let db = open_database(db_path)?;
    let local = db.get_all_records().await?;

    let outcome = reconcile(&local, &imported);
    db.upsert_all(&outcome.local_changes).await?;
    if !outcome.conflicts.is_empty() {
        db.record_conflicts(&outcome.conflicts, now_millis()).await?;
    }

    println!(
        "Imported {} of {} records ({} conflicts)",
        outcome.local_changes.len(),
        imported.len(),
        outcome.conflicts.len()
    );
    Ok(outcome)
}
