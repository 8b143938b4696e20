use std::path::Path;

use tasksync_core::models::NewTask;

use crate::cli::PriorityArg;
use crate::commands::common::{normalize_title, open_database, parse_due_date};
use crate::error::CliError;

pub struct AddOptions<'a> {
    pub title_parts: &'a [String],
    pub description: Option<&'a str>,
    pub priority: PriorityArg,
    pub due: Option<&'a str>,
    pub category: Option<i64>,
}

pub async fn run_add(options: AddOptions<'_>, db_path: &Path) -> Result<(), CliError> {
    let title = normalize_title(options.title_parts)?;
    let due_date = options.due.map(parse_due_date).transpose()?;

    let db = open_database(db_path)?;
    let task = db
        .create_task(&NewTask {
            title,
            description: options.description.unwrap_or_default().trim().to_string(),
            priority: options.priority.into(),
            category_id: options.category,
            due_date,
        })
        .await?;

    println!("{}", task.id);
    Ok(())
}
