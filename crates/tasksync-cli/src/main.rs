//! tasksync CLI - Manage tasks from the terminal and keep them in sync
//!
//! Tasks live in a local SQLite file; `tasksync sync` reconciles them with a
//! shared snapshot on a WebDAV server or a local folder.

mod cli;
mod commands;
mod error;


use clap::{CommandFactory, Parser};

use crate::cli::{Cli, Commands, PriorityArg, SyncCommands};
use crate::commands::add::{run_add, AddOptions};
use crate::commands::common::resolve_db_path;
use crate::commands::config::run_config;
use crate::commands::delete::run_delete;
use crate::commands::done::run_done;
use crate::commands::edit::{run_edit, EditOptions};
use crate::commands::export::{run_export, ExportTarget};
use crate::commands::import::run_import;
use crate::commands::list::run_list;
use crate::commands::sync::{run_sync, run_sync_conflicts, run_sync_status, run_sync_watch};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tasksync=info".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);

    match cli.command {
        Some(Commands::Add {
            title,
            description,
            priority,
            due,
            category,
        }) => {
            let options = AddOptions {
                title_parts: &title,
                description: description.as_deref(),
                priority,
                due: due.as_deref(),
                category,
            };
            run_add(options, &db_path).await?;
        }
        Some(Commands::List {
            filter,
            limit,
            json,
        }) => run_list(filter, limit, json, &db_path).await?,
        Some(Commands::Done { id, undo }) => run_done(&id, undo, &db_path).await?,
        Some(Commands::Edit {
            id,
            title,
            description,
            priority,
            due,
            clear_due,
        }) => {
            let options = EditOptions {
                title: title.as_deref(),
                description: description.as_deref(),
                priority,
                due: due.as_deref(),
                clear_due,
            };
            run_edit(&id, options, &db_path).await?;
        }
        Some(Commands::Delete { id }) => run_delete(&id, &db_path).await?,
        Some(Commands::Export {
            format,
            output,
            backup,
        }) => {
            let target = match (output.as_deref(), backup.as_deref()) {
                (Some(path), _) => ExportTarget::File(path),
                (None, Some(dir)) => ExportTarget::BackupIn(dir),
                (None, None) => ExportTarget::Stdout,
            };
            run_export(format, target, &db_path).await?;
        }
        Some(Commands::Import { path }) => {
            run_import(&path, &db_path).await?;
        }
        Some(Commands::Sync { command }) => match command {
            None => {
                run_sync(&db_path).await?;
            }
            Some(SyncCommands::Status { json }) => run_sync_status(json, &db_path).await?,
            Some(SyncCommands::Conflicts { limit, json }) => {
                run_sync_conflicts(limit, json, &db_path).await?;
            }
            Some(SyncCommands::Watch { interval }) => {
                run_sync_watch(interval, &db_path).await?;
            }
        },
        Some(Commands::Config { command }) => run_config(command, &db_path).await?,
        None => {
            // Quick add mode: tasksync "buy milk"
            if cli.title.is_empty() {
                Cli::command().print_help().map_err(CliError::Io)?;
                println!();
            } else {
                let options = AddOptions {
                    title_parts: &cli.title,
                    description: None,
                    priority: PriorityArg::Normal,
                    due: None,
                    category: None,
                };
                run_add(options, &db_path).await?;
            }
        }
    }

    Ok(())
}
