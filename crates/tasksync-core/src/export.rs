//! Snapshot export and restore shared by clients.

use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::codec::{decode_snapshot, encode_snapshot, format_timestamp};
use crate::models::{Snapshot, TaskRecord};
use crate::{Error, Result};

/// Export output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Same payload as the remote snapshot; can be restored
    #[default]
    Json,
    /// Human-readable checklist of live tasks
    Markdown,
}

impl ExportFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Markdown => "md",
        }
    }
}

/// Render a snapshot in the selected format.
#[must_use]
pub fn render_export(snapshot: &Snapshot, format: ExportFormat) -> String {
    match format {
        ExportFormat::Json => String::from_utf8_lossy(&encode_snapshot(snapshot)).into_owned(),
        ExportFormat::Markdown => render_markdown_export(snapshot),
    }
}

fn checklist_line(output: &mut String, task: &TaskRecord) {
    let mark = if task.completed { 'x' } else { ' ' };
    let _ = write!(output, "- [{mark}] {} ({})", task.title_preview(120), task.priority);
    if let Some(due) = task.due_date {
        let _ = write!(output, " due {}", due.format("%Y-%m-%d %H:%M"));
    }
    output.push('\n');
}

/// Render live tasks as a Markdown checklist, open tasks first.
#[must_use]
pub fn render_markdown_export(snapshot: &Snapshot) -> String {
    let (done, open): (Vec<&TaskRecord>, Vec<&TaskRecord>) = snapshot
        .records()
        .filter(|task| !task.deleted)
        .partition(|task| task.completed);

    let mut output = String::from("# Tasks\n");
    for (heading, tasks) in [("Open", open), ("Completed", done)] {
        if tasks.is_empty() {
            continue;
        }
        let _ = writeln!(output, "\n## {heading} ({})\n", tasks.len());
        for task in tasks {
            checklist_line(&mut output, task);
            if !task.description.trim().is_empty() {
                let _ = writeln!(output, "  {}", task.description.trim());
            }
        }
    }
    output
}

/// Write an export file.
pub fn write_export(path: &Path, snapshot: &Snapshot, format: ExportFormat) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, render_export(snapshot, format))?;
    tracing::info!(
        "Exported {} records to {}",
        snapshot.len(),
        path.display()
    );
    Ok(())
}

/// Read a JSON export back into a snapshot.
pub fn read_export(path: &Path) -> Result<Snapshot> {
    let bytes = std::fs::read(path)?;
    decode_snapshot(&bytes)
        .map_err(|error| Error::InvalidInput(format!("{}: {error}", path.display())))
}

/// Build a deterministic default file name for export flows.
#[must_use]
pub fn suggested_export_file_name(format: ExportFormat, at: DateTime<Utc>) -> String {
    format!(
        "tasksync_backup_{}.{}",
        at.format("%Y%m%d_%H%M%S"),
        format.extension()
    )
}

/// One-line description of a snapshot for status output.
#[must_use]
pub fn summarize(snapshot: &Snapshot) -> String {
    let live = snapshot.live_count();
    let completed = snapshot
        .records()
        .filter(|task| !task.deleted && task.completed)
        .count();
    let newest = snapshot
        .records()
        .map(|task| task.modified_date)
        .max()
        .map_or_else(|| "never".to_string(), |at| format_timestamp(&at));
    format!(
        "{live} tasks ({completed} completed, {} deleted), last modified {newest}",
        snapshot.len() - live
    )
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    use super::*;
    use crate::models::{Priority, TaskId};

    fn fixture() -> Snapshot {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        let open = TaskRecord {
            priority: Priority::High,
            due_date: Some(at),
            description: "before friday".to_string(),
            created_date: at,
            modified_date: at,
            ..TaskRecord::new(TaskId::new(1), "Write report")
        };
        let done = TaskRecord {
            completed: true,
            completed_date: Some(at),
            created_date: at,
            modified_date: at,
            ..TaskRecord::new(TaskId::new(2), "Water plants")
        };
        let gone = TaskRecord {
            deleted: true,
            created_date: at,
            modified_date: at,
            ..TaskRecord::new(TaskId::new(3), "Old idea")
        };
        [open, done, gone].into_iter().collect()
    }

    #[test]
    fn markdown_export_lists_live_tasks_by_state() {
        let markdown = render_markdown_export(&fixture());

        assert_eq!(
            markdown,
            "# Tasks\n\n## Open (1)\n\n- [ ] Write report (high) due 2024-03-01 09:30\n  before friday\n\n## Completed (1)\n\n- [x] Water plants (normal)\n"
        );
        assert!(!markdown.contains("Old idea"));
    }

    #[test]
    fn json_export_restores_including_tombstones() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("backups").join("tasks.json");
        let snapshot = fixture();

        write_export(&path, &snapshot, ExportFormat::Json).unwrap();
        assert_eq!(read_export(&path).unwrap(), snapshot);
    }

    #[test]
    fn read_export_rejects_markdown() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tasks.md");
        write_export(&path, &fixture(), ExportFormat::Markdown).unwrap();

        assert!(matches!(read_export(&path), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn suggested_file_name_uses_timestamp() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 5).unwrap();
        assert_eq!(
            suggested_export_file_name(ExportFormat::Markdown, at),
            "tasksync_backup_20240301_093005.md"
        );
    }

    #[test]
    fn summarize_counts_states() {
        assert_eq!(
            summarize(&fixture()),
            "2 tasks (1 completed, 1 deleted), last modified 2024-03-01T09:30:00.000Z"
        );
        assert_eq!(
            summarize(&Snapshot::new()),
            "0 tasks (0 completed, 0 deleted), last modified never"
        );
    }
}
