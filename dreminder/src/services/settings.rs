//! Settings service
//!
//! Manages application settings persistence using JSON file storage.

use crate::config::{
    DEFAULT_REMINDER_OFFSET_SECS, MAX_REMINDER_OFFSET_SECS, MIN_REMINDER_OFFSET_SECS,
    SETTINGS_FILE,
};
use crate::error::{AppError, Result};
use crate::services::notifier::NotifierKind;
use crate::services::permission::Permission;
use crate::services::scheduler::DueCheckMode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

/// Persisted application settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    /// Seconds between creating a reminder and its due time
    #[serde(default = "default_reminder_offset")]
    pub reminder_offset_secs: u64,
    #[serde(default)]
    pub due_check: DueCheckMode,
    #[serde(default)]
    pub notifier: NotifierKind,
    /// Answer given when the notifier is asked for permission
    #[serde(default = "default_notification_permission")]
    pub notification_permission: Permission,
}

fn default_reminder_offset() -> u64 {
    DEFAULT_REMINDER_OFFSET_SECS
}

fn default_notification_permission() -> Permission {
    Permission::Granted
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            reminder_offset_secs: default_reminder_offset(),
            due_check: DueCheckMode::default(),
            notifier: NotifierKind::default(),
            notification_permission: default_notification_permission(),
        }
    }
}

impl AppSettings {
    pub fn validate(&self) -> Result<()> {
        if !(MIN_REMINDER_OFFSET_SECS..=MAX_REMINDER_OFFSET_SECS)
            .contains(&self.reminder_offset_secs)
        {
            return Err(AppError::Config(format!(
                "Reminder offset must be between {} and {} seconds, got {}",
                MIN_REMINDER_OFFSET_SECS, MAX_REMINDER_OFFSET_SECS, self.reminder_offset_secs
            )));
        }
        Ok(())
    }

    pub fn reminder_offset_ms(&self) -> i64 {
        i64::try_from(self.reminder_offset_secs.saturating_mul(1_000)).unwrap_or(i64::MAX)
    }
}

pub struct SettingsService {
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new(app_data_dir: PathBuf) -> Self {
        Self {
            settings_path: app_data_dir.join(SETTINGS_FILE),
        }
    }

    /// Load settings from disk or create default if not exists
    pub async fn load(&self) -> Result<AppSettings> {
        if !self.settings_path.exists() {
            tracing::info!("Settings file not found, creating default settings");
            let default = AppSettings::default();
            self.save(&default).await?;
            return Ok(default);
        }

        let content = fs::read_to_string(&self.settings_path).await?;
        let settings: AppSettings = serde_json::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse settings: {}", e)))?;
        settings.validate()?;

        Ok(settings)
    }

    /// Save settings to disk
    pub async fn save(&self, settings: &AppSettings) -> Result<()> {
        settings.validate()?;
        let content = serde_json::to_string_pretty(settings)?;

        if let Some(parent) = self.settings_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&self.settings_path, content).await?;
        tracing::info!("Settings saved to {:?}", self.settings_path);

        Ok(())
    }
}
