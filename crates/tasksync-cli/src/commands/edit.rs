use std::path::Path;

use crate::cli::PriorityArg;
use crate::commands::common::{normalize_title, open_database, parse_due_date, resolve_task};
use crate::error::CliError;

#[derive(Default)]
pub struct EditOptions<'a> {
    pub title: Option<&'a str>,
    pub description: Option<&'a str>,
    pub priority: Option<PriorityArg>,
    pub due: Option<&'a str>,
    pub clear_due: bool,
}

impl EditOptions<'_> {
    const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.priority.is_none()
            && self.due.is_none()
            && !self.clear_due
    }
}

pub async fn run_edit(id: &str, options: EditOptions<'_>, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let mut task = resolve_task(id, &db).await?;
    if options.is_empty() {
        println!("{}", task.id);
        return Ok(());
    }

    if let Some(title) = options.title {
        task.title = normalize_title(&[title.to_string()])?;
    }
    if let Some(description) = options.description {
        task.description = description.trim().to_string();
    }
    if let Some(priority) = options.priority {
        task.priority = priority.into();
    }
    if options.clear_due {
        task.due_date = None;
    } else if let Some(due) = options.due {
        task.due_date = Some(parse_due_date(due)?);
    }

    let task = db.update_task(&task).await?;
    println!("{}", task.id);
    Ok(())
}
