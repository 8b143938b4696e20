use std::path::Path;

use tasksync_core::util::now_millis;

use crate::cli::ListFilter;
use crate::commands::common::{
    format_task_lines, open_database, task_filter, task_to_list_item, TaskListItem,
};
use crate::error::CliError;

pub async fn run_list(
    filter: ListFilter,
    limit: usize,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let tasks = db.list_tasks(task_filter(filter), limit, 0).await?;
    let now = now_millis();

    if as_json {
        let json_items = tasks
            .iter()
            .map(|task| task_to_list_item(task, now))
            .collect::<Vec<TaskListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if tasks.is_empty() {
        println!("No tasks.");
    } else {
        for line in format_task_lines(&tasks, now) {
            println!("{line}");
        }
    }

    Ok(())
}
