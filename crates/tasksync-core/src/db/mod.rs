//! Database layer for tasksync

mod connection;
mod migrations;
mod settings_repository;
mod task_repository;

pub use connection::Database;
pub use settings_repository::{SettingsRepository, SqliteSettingsRepository};
pub use task_repository::{SqliteTaskRepository, TaskFilter, TaskRepository};
