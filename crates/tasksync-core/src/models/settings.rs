//! Sync settings model

use std::env;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::util::normalize_text_option;
use crate::{Error, Result};

const ENV_REMOTE_URL: &str = "TASKSYNC_REMOTE_URL";
const ENV_REMOTE_USER: &str = "TASKSYNC_REMOTE_USER";
const ENV_REMOTE_SECRET: &str = "TASKSYNC_REMOTE_SECRET";

/// Default automatic sync interval in seconds
pub const DEFAULT_AUTO_SYNC_INTERVAL_SECS: u64 = 60;

/// Sync preferences and credentials persisted in the local settings table
#[derive(Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Remote base address (`https://…` WebDAV root or `file://…` directory)
    pub remote_url: Option<String>,
    /// Remote principal (user name)
    pub username: Option<String>,
    /// Remote secret (password or app token)
    pub password: Option<String>,
    /// Whether the scheduler should sync periodically
    pub auto_sync_enabled: bool,
    /// Interval between scheduled syncs
    pub auto_sync_interval_secs: u64,
    /// Instant of the last successful sync
    pub last_sync_completed_at: Option<DateTime<Utc>>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            remote_url: None,
            username: None,
            password: None,
            auto_sync_enabled: false,
            auto_sync_interval_secs: DEFAULT_AUTO_SYNC_INTERVAL_SECS,
            last_sync_completed_at: None,
        }
    }
}

impl fmt::Debug for SyncSettings {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SyncSettings")
            .field("remote_url", &self.remote_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("auto_sync_enabled", &self.auto_sync_enabled)
            .field("auto_sync_interval_secs", &self.auto_sync_interval_secs)
            .field("last_sync_completed_at", &self.last_sync_completed_at)
            .finish()
    }
}

impl SyncSettings {
    /// Resolve complete credentials, or the names of the empty fields
    pub fn credentials(&self) -> std::result::Result<RemoteCredentials, Vec<&'static str>> {
        let remote_url = normalize_text_option(self.remote_url.clone());
        let username = normalize_text_option(self.username.clone());
        // Secrets are opaque: only emptiness is checked, surrounding whitespace is kept.
        let password = self.password.clone().filter(|value| !value.is_empty());

        let mut missing = Vec::new();
        if remote_url.is_none() {
            missing.push("remote_url");
        }
        if username.is_none() {
            missing.push("username");
        }
        if password.is_none() {
            missing.push("password");
        }

        match (remote_url, username, password) {
            (Some(base_url), Some(principal), Some(secret)) => Ok(RemoteCredentials {
                base_url,
                principal,
                secret,
            }),
            _ => Err(missing),
        }
    }

    /// Scheduler interval, never shorter than one second
    #[must_use]
    pub fn auto_sync_interval(&self) -> Duration {
        Duration::from_secs(self.auto_sync_interval_secs.max(1))
    }

    /// Overlay credentials onto these settings
    pub fn apply_credentials(&mut self, credentials: RemoteCredentials) {
        self.remote_url = Some(credentials.base_url);
        self.username = Some(credentials.principal);
        self.password = Some(credentials.secret);
    }
}

/// Complete remote credentials for one sync session
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteCredentials {
    /// Remote base address
    pub base_url: String,
    /// Remote principal
    pub principal: String,
    /// Remote secret
    pub secret: String,
}

impl fmt::Debug for RemoteCredentials {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RemoteCredentials")
            .field("base_url", &self.base_url)
            .field("principal", &self.principal)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl RemoteCredentials {
    /// Load credentials from environment variables.
    ///
    /// Returns `Ok(None)` when none of the variables are set.
    /// Returns an error when only a partial configuration is provided.
    pub fn from_env() -> Result<Option<Self>> {
        parse_credentials(|key| env::var(key).ok())
    }
}

fn parse_credentials(lookup: impl Fn(&str) -> Option<String>) -> Result<Option<RemoteCredentials>> {
    let base_url = lookup(ENV_REMOTE_URL).map(|value| value.trim().to_string());
    let principal = lookup(ENV_REMOTE_USER).map(|value| value.trim().to_string());
    let secret = lookup(ENV_REMOTE_SECRET);

    if base_url.is_none() && principal.is_none() && secret.is_none() {
        return Ok(None);
    }

    let mut missing = Vec::new();
    if base_url.as_ref().map_or(true, String::is_empty) {
        missing.push(ENV_REMOTE_URL);
    }
    if principal.as_ref().map_or(true, String::is_empty) {
        missing.push(ENV_REMOTE_USER);
    }
    if secret.as_ref().map_or(true, String::is_empty) {
        missing.push(ENV_REMOTE_SECRET);
    }

    match (base_url, principal, secret) {
        (Some(base_url), Some(principal), Some(secret)) if missing.is_empty() => {
            Ok(Some(RemoteCredentials {
                base_url,
                principal,
                secret,
            }))
        }
        _ => Err(Error::InvalidInput(format!(
            "Remote configuration is incomplete. Missing: {}",
            missing.join(", ")
        ))),
    }
}
