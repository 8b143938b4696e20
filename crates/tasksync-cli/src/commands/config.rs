use std::path::Path;

use serde::Serialize;
use tasksync_core::sync::SettingsStore;
use tasksync_core::util::{is_http_url, normalize_text_option};
use tasksync_core::SyncSettings;

use crate::cli::ConfigCommands;
use crate::commands::common::{format_sync_timestamp, open_database};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct SyncSettingsItem {
    pub remote_url: Option<String>,
    pub username: Option<String>,
    pub password_set: bool,
    pub auto_sync_enabled: bool,
    pub auto_sync_interval_secs: u64,
    pub last_sync_completed_at: Option<String>,
}

impl From<&SyncSettings> for SyncSettingsItem {
    fn from(settings: &SyncSettings) -> Self {
        Self {
            remote_url: settings.remote_url.clone(),
            username: settings.username.clone(),
            password_set: settings.password.is_some(),
            auto_sync_enabled: settings.auto_sync_enabled,
            auto_sync_interval_secs: settings.auto_sync_interval_secs,
            last_sync_completed_at: settings.last_sync_completed_at.map(format_sync_timestamp),
        }
    }
}

pub async fn run_config(command: ConfigCommands, db_path: &Path) -> Result<(), CliError> {
    match command {
        ConfigCommands::Set {
            url,
            username,
            password,
            auto_sync,
            interval,
        } => {
            let update = SettingsUpdate {
                url,
                username,
                password,
                auto_sync,
                interval,
            };
            run_config_set(update, db_path).await
        }
        ConfigCommands::Show { json } => run_config_show(json, db_path).await,
        ConfigCommands::Clear => run_config_clear(db_path).await,
    }
}

#[derive(Debug, Default)]
pub struct SettingsUpdate {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub auto_sync: Option<bool>,
    pub interval: Option<u64>,
}

/// Accept WebDAV roots and local folders.
pub fn validate_remote_url(url: &str) -> Result<(), CliError> {
    if is_http_url(url) || url.starts_with("file://") {
        Ok(())
    } else {
        Err(CliError::Config(format!(
            "Remote URL must start with http://, https:// or file:// (got '{url}')"
        )))
    }
}

pub async fn run_config_set(update: SettingsUpdate, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let mut settings = db.load_sync_settings().await?;

    if let Some(url) = normalize_text_option(update.url) {
        validate_remote_url(&url)?;
        settings.remote_url = Some(url);
    }
    if let Some(username) = normalize_text_option(update.username) {
        settings.username = Some(username);
    }
    if let Some(password) = update.password.filter(|value| !value.is_empty()) {
        settings.password = Some(password);
    }
    if let Some(enabled) = update.auto_sync {
        settings.auto_sync_enabled = enabled;
    }
    if let Some(interval) = update.interval {
        if interval == 0 {
            return Err(CliError::Config(
                "Auto-sync interval must be at least 1 second".to_string(),
            ));
        }
        settings.auto_sync_interval_secs = interval;
    }

    db.save_sync_settings(&settings).await?;
    tracing::info!("Updated sync settings: {settings:?}");
    println!("Sync settings saved");
    Ok(())
}

pub async fn run_config_show(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let settings = db.load_sync_settings().await?;
    let item = SyncSettingsItem::from(&settings);

    if as_json {
        println!("{}", serde_json::to_string_pretty(&item)?);
        return Ok(());
    }

    println!(
        "remote_url:              {}",
        item.remote_url.as_deref().unwrap_or("-")
    );
    println!(
        "username:                {}",
        item.username.as_deref().unwrap_or("-")
    );
    println!(
        "password:                {}",
        if item.password_set { "********" } else { "-" }
    );
    println!("auto_sync_enabled:       {}", item.auto_sync_enabled);
    println!("auto_sync_interval_secs: {}", item.auto_sync_interval_secs);
    println!(
        "last_sync_completed_at:  {}",
        item.last_sync_completed_at.as_deref().unwrap_or("never")
    );
    Ok(())
}

pub async fn run_config_clear(db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let mut settings = db.load_sync_settings().await?;
    settings.remote_url = None;
    settings.username = None;
    settings.password = None;
    db.save_sync_settings(&settings).await?;
    println!("Remote credentials cleared");
    Ok(())
}
