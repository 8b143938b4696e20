use std::path::Path;

use crate::commands::common::{open_database, resolve_task};
use crate::error::CliError;

pub async fn run_done(id: &str, undo: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let task = resolve_task(id, &db).await?;

    let task = db.set_task_completed(task.id, !undo).await?;
    println!("{}", task.id);
    Ok(())
}
