use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tasksync_core::export::ExportFormat as CoreExportFormat;
use tasksync_core::Priority;

#[derive(Parser)]
#[command(name = "tasksync")]
#[command(about = "Manage tasks locally and sync them with a WebDAV or folder remote")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Quick add: tasksync "buy milk"
    #[arg(trailing_var_arg = true)]
    pub title: Vec<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new task
    #[command(alias = "new")]
    Add {
        /// Task title
        title: Vec<String>,
        /// Longer description
        #[arg(short, long)]
        description: Option<String>,
        /// Task priority
        #[arg(short, long, value_enum, default_value_t = PriorityArg::Normal)]
        priority: PriorityArg,
        /// Due date (YYYY-MM-DD or RFC 3339)
        #[arg(long, value_name = "DATE")]
        due: Option<String>,
        /// Category id
        #[arg(long, value_name = "ID")]
        category: Option<i64>,
    },
    /// List tasks, soonest due first
    List {
        /// Which tasks to show
        #[arg(short, long, value_enum, default_value_t = ListFilter::Active)]
        filter: ListFilter,
        /// Number of tasks to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mark a task completed
    Done {
        /// Task ID
        id: String,
        /// Reopen the task instead
        #[arg(long)]
        undo: bool,
    },
    /// Edit an existing task
    Edit {
        /// Task ID
        id: String,
        /// New title
        #[arg(long)]
        title: Option<String>,
        /// New description
        #[arg(short, long)]
        description: Option<String>,
        /// New priority
        #[arg(short, long, value_enum)]
        priority: Option<PriorityArg>,
        /// New due date (YYYY-MM-DD or RFC 3339)
        #[arg(long, value_name = "DATE", conflicts_with = "clear_due")]
        due: Option<String>,
        /// Remove the due date
        #[arg(long)]
        clear_due: bool,
    },
    /// Delete a task
    Delete {
        /// Task ID
        id: String,
    },
    /// Export tasks
    Export {
        /// Export format
        #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
        /// Write a timestamped backup file into this directory
        #[arg(
            long,
            value_name = "DIR",
            conflicts_with = "output",
            num_args = 0..=1,
            default_missing_value = "."
        )]
        backup: Option<PathBuf>,
    },
    /// Merge a JSON export into the local tasks
    Import {
        /// Export file to read
        path: PathBuf,
    },
    /// Sync local tasks with the configured remote
    Sync {
        #[command(subcommand)]
        command: Option<SyncCommands>,
    },
    /// Configure the sync remote
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Markdown,
}

impl From<ExportFormat> for CoreExportFormat {
    fn from(format: ExportFormat) -> Self {
        match format {
            ExportFormat::Json => Self::Json,
            ExportFormat::Markdown => Self::Markdown,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum PriorityArg {
    Low,
    Normal,
    High,
}

impl From<PriorityArg> for Priority {
    fn from(priority: PriorityArg) -> Self {
        match priority {
            PriorityArg::Low => Self::Low,
            PriorityArg::Normal => Self::Normal,
            PriorityArg::High => Self::High,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ListFilter {
    All,
    Active,
    Completed,
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// Show remote configuration and last successful sync
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List recently resolved sync conflicts
    Conflicts {
        /// Number of conflicts to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Sync periodically until interrupted
    Watch {
        /// Seconds between runs (defaults to the configured interval)
        #[arg(long, value_name = "SECS")]
        interval: Option<u64>,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Update sync settings
    Set {
        /// Remote base address (https://... WebDAV root or file://... folder)
        #[arg(long, value_name = "URL")]
        url: Option<String>,
        /// Remote user name
        #[arg(long)]
        username: Option<String>,
        /// Remote password or app token
        #[arg(long)]
        password: Option<String>,
        /// Enable or disable periodic sync
        #[arg(long, value_name = "BOOL")]
        auto_sync: Option<bool>,
        /// Seconds between periodic syncs
        #[arg(long, value_name = "SECS")]
        interval: Option<u64>,
    },
    /// Show sync settings (the password is never printed)
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove stored remote credentials
    Clear,
}
