//! Settings repository implementation

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::models::{SyncSettings, DEFAULT_AUTO_SYNC_INTERVAL_SECS};
use crate::util::{from_unix_millis, normalize_text_option};

const KEY_REMOTE_URL: &str = "webdav_url";
const KEY_USERNAME: &str = "webdav_username";
const KEY_PASSWORD: &str = "webdav_password";
const KEY_AUTO_SYNC_ENABLED: &str = "auto_sync_enabled";
const KEY_AUTO_SYNC_INTERVAL: &str = "auto_sync_interval_secs";
const KEY_LAST_SYNC_COMPLETED: &str = "last_sync_completed_at";

/// Trait for settings storage operations
pub trait SettingsRepository {
    /// Load sync settings, falling back to defaults for absent keys
    fn load(&self) -> Result<SyncSettings>;

    /// Save sync settings; `None` fields remove the stored value
    fn save(&self, settings: &SyncSettings) -> Result<()>;

    /// Record the completion instant of a successful sync
    fn record_sync_completed(&self, at: DateTime<Utc>) -> Result<()>;
}

/// `SQLite` implementation of `SettingsRepository`
pub struct SqliteSettingsRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteSettingsRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM settings WHERE key = ?", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)",
            params![key, value],
        )?;
        Ok(())
    }

    fn set_optional(&self, key: &str, value: Option<&str>) -> Result<()> {
        match value {
            Some(value) => self.set_setting(key, value),
            None => {
                self.conn
                    .execute("DELETE FROM settings WHERE key = ?", [key])?;
                Ok(())
            }
        }
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

impl SettingsRepository for SqliteSettingsRepository<'_> {
    fn load(&self) -> Result<SyncSettings> {
        let mut settings = SyncSettings {
            remote_url: normalize_text_option(self.get_setting(KEY_REMOTE_URL)?),
            username: normalize_text_option(self.get_setting(KEY_USERNAME)?),
            password: self
                .get_setting(KEY_PASSWORD)?
                .filter(|value| !value.is_empty()),
            ..SyncSettings::default()
        };

        if let Some(value) = self.get_setting(KEY_AUTO_SYNC_ENABLED)? {
            settings.auto_sync_enabled = parse_bool(&value);
        }

        if let Some(value) = self.get_setting(KEY_AUTO_SYNC_INTERVAL)? {
            settings.auto_sync_interval_secs = value
                .trim()
                .parse()
                .unwrap_or(DEFAULT_AUTO_SYNC_INTERVAL_SECS);
        }

        if let Some(value) = self.get_setting(KEY_LAST_SYNC_COMPLETED)? {
            settings.last_sync_completed_at = value.trim().parse().ok().map(from_unix_millis);
        }

        Ok(settings)
    }

    fn save(&self, settings: &SyncSettings) -> Result<()> {
        self.set_optional(KEY_REMOTE_URL, settings.remote_url.as_deref())?;
        self.set_optional(KEY_USERNAME, settings.username.as_deref())?;
        self.set_optional(KEY_PASSWORD, settings.password.as_deref())?;
        self.set_setting(
            KEY_AUTO_SYNC_ENABLED,
            if settings.auto_sync_enabled {
                "true"
            } else {
                "false"
            },
        )?;
        self.set_setting(
            KEY_AUTO_SYNC_INTERVAL,
            &settings.auto_sync_interval_secs.to_string(),
        )?;
        let completed = settings
            .last_sync_completed_at
            .map(|at| at.timestamp_millis().to_string());
        self.set_optional(KEY_LAST_SYNC_COMPLETED, completed.as_deref())?;
        Ok(())
    }

    fn record_sync_completed(&self, at: DateTime<Utc>) -> Result<()> {
        self.set_setting(KEY_LAST_SYNC_COMPLETED, &at.timestamp_millis().to_string())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::db::Database;

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_load_default_settings() {
        let db = setup();
        let repo = SqliteSettingsRepository::new(db.connection());

        let settings = repo.load().unwrap();
        assert_eq!(settings, SyncSettings::default());
    }

    #[test]
    fn test_save_and_load_settings() {
        let db = setup();
        let repo = SqliteSettingsRepository::new(db.connection());

        let settings = SyncSettings {
            remote_url: Some("https://dav.example.com/remote.php/dav/files/alice".to_string()),
            username: Some("alice".to_string()),
            password: Some("app-token".to_string()),
            auto_sync_enabled: true,
            auto_sync_interval_secs: 300,
            last_sync_completed_at: Some(Utc.timestamp_millis_opt(1_700_000_000_500).unwrap()),
        };

        repo.save(&settings).unwrap();
        assert_eq!(repo.load().unwrap(), settings);
    }

    #[test]
    fn test_clearing_credentials_removes_values() {
        let db = setup();
        let repo = SqliteSettingsRepository::new(db.connection());

        repo.save(&SyncSettings {
            username: Some("alice".to_string()),
            password: Some("secret".to_string()),
            ..SyncSettings::default()
        })
        .unwrap();
        repo.save(&SyncSettings::default()).unwrap();

        let loaded = repo.load().unwrap();
        assert!(loaded.username.is_none());
        assert!(loaded.password.is_none());
    }

    #[test]
    fn test_record_sync_completed() {
        let db = setup();
        let repo = SqliteSettingsRepository::new(db.connection());
        let at = Utc.timestamp_millis_opt(1_700_000_123_456).unwrap();

        repo.record_sync_completed(at).unwrap();
        assert_eq!(repo.load().unwrap().last_sync_completed_at, Some(at));
    }

    #[test]
    fn test_invalid_interval_falls_back_to_default() {
        let db = setup();
        let repo = SqliteSettingsRepository::new(db.connection());
        repo.set_setting(KEY_AUTO_SYNC_INTERVAL, "soon").unwrap();

        assert_eq!(
            repo.load().unwrap().auto_sync_interval_secs,
            DEFAULT_AUTO_SYNC_INTERVAL_SECS
        );
    }
}
