use std::path::{Path, PathBuf};

use tasksync_core::export::{render_export, suggested_export_file_name, write_export};
use tasksync_core::sync::TaskStore;
use tasksync_core::util::now_millis;

use crate::cli::ExportFormat;
use crate::commands::common::open_database;
use crate::error::CliError;

/// Where an export is written
#[derive(Debug, Clone, Copy)]
pub enum ExportTarget<'a> {
    Stdout,
    File(&'a Path),
    /// A `tasksync_backup_<timestamp>` file inside this directory
    BackupIn(&'a Path),
}

/// Returns the written file, if any.
pub async fn run_export(
    format: ExportFormat,
    target: ExportTarget<'_>,
    db_path: &Path,
) -> Result<Option<PathBuf>, CliError> {
    let db = open_database(db_path)?;
    let snapshot = db.get_all_records().await?;

    let path = match target {
        ExportTarget::Stdout => {
            println!("{}", render_export(&snapshot, format.into()));
            return Ok(None);
        }
        ExportTarget::File(path) => path.to_path_buf(),
        ExportTarget::BackupIn(dir) => {
            dir.join(suggested_export_file_name(format.into(), now_millis()))
        }
    };

    write_export(&path, &snapshot, format.into())?;
    println!("{}", path.display());
    Ok(Some(path))
}
