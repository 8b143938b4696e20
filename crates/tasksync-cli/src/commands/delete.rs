use std::path::Path;

use crate::commands::common::{open_database, resolve_task};
use crate::error::CliError;

pub async fn run_delete(id: &str, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let task = resolve_task(id, &db).await?;

    db.delete_task(task.id).await?;
    println!("{}", task.id);
    Ok(())
}
