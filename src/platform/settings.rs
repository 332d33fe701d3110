// ETWSpy - platform/settings.rs
//
// Persisted user settings. On Windows they live in the registry under
// HKCU\Software\ETWSpy; elsewhere in a JSON file in the platform config
// directory, so the rest of the crate behaves identically off-Windows.
//
// All settings I/O is best-effort: a missing or unreadable store yields
// defaults, and save failures are logged at debug level and otherwise
// ignored. Settings are never worth an error dialog.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::core::catalog::ProviderEntry;
use crate::util::constants::DEFAULT_MAX_DISPLAY_EVENTS;

/// How event timestamps are rendered in the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampFormat {
    /// Local time with date.
    Local,
    /// UTC with date.
    Utc,
    /// Local time of day only, for dense traces within one day.
    TimeOnly,
}

impl Default for TimestampFormat {
    fn default() -> Self {
        TimestampFormat::Local
    }
}

impl TimestampFormat {
    pub fn all() -> &'static [TimestampFormat] {
        &[
            TimestampFormat::Local,
            TimestampFormat::Utc,
            TimestampFormat::TimeOnly,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            TimestampFormat::Local => "Local",
            TimestampFormat::Utc => "UTC",
            TimestampFormat::TimeOnly => "Time only",
        }
    }

    /// Render a timestamp for the grid.
    pub fn format(&self, timestamp: DateTime<Utc>) -> String {
        match self {
            TimestampFormat::Local => timestamp
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S%.3f")
                .to_string(),
            TimestampFormat::Utc => timestamp.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
            TimestampFormat::TimeOnly => timestamp
                .with_timezone(&Local)
                .format("%H:%M:%S%.3f")
                .to_string(),
        }
    }
}

/// User preferences persisted across runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Dark (true) or light theme.
    pub dark_mode: bool,

    /// Timestamp rendering for the events grid.
    pub timestamp_format: TimestampFormat,

    /// Display-buffer cap.
    pub max_events: usize,

    /// Keep the grid scrolled to the newest event.
    pub autoscroll: bool,

    /// Reload the last configuration on startup.
    pub restore_session: bool,

    /// Path of the last loaded/saved configuration file.
    pub last_config_path: Option<std::path::PathBuf>,

    /// User-defined provider catalog entries, appended to the built-ins.
    pub custom_providers: Vec<ProviderEntry>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dark_mode: true,
            timestamp_format: TimestampFormat::default(),
            max_events: DEFAULT_MAX_DISPLAY_EVENTS,
            autoscroll: true,
            restore_session: false,
            last_config_path: None,
            custom_providers: Vec::new(),
        }
    }
}

/// Load settings from the platform store, falling back to defaults.
pub fn load() -> Settings {
    match store::load() {
        Ok(Some(settings)) => settings,
        Ok(None) => Settings::default(),
        Err(e) => {
            tracing::debug!(error = %e, "Failed to load settings; using defaults");
            Settings::default()
        }
    }
}

/// Persist settings, best-effort.
pub fn save(settings: &Settings) {
    if let Err(e) = store::save(settings) {
        tracing::debug!(error = %e, "Failed to save settings");
    }
}

// ---------------------------------------------------------------------------
// Registry store (Windows)
// ---------------------------------------------------------------------------

#[cfg(windows)]
mod store {
    use super::Settings;
    use crate::util::constants::REGISTRY_SETTINGS_PATH;
    use winreg::enums::HKEY_CURRENT_USER;
    use winreg::RegKey;

    pub fn load() -> std::io::Result<Option<Settings>> {
        let hkcu = RegKey::predef(HKEY_CURRENT_USER);
        let key = match hkcu.open_subkey(REGISTRY_SETTINGS_PATH) {
            Ok(key) => key,
            Err(_) => return Ok(None),
        };
        let json: String = key.get_value("Settings")?;
        let settings = serde_json::from_str(&json)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Ok(Some(settings))
    }

    pub fn save(settings: &Settings) -> std::io::Result<()> {
        let json = serde_json::to_string(settings)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let hkcu = RegKey::predef(HKEY_CURRENT_USER);
        let (key, _) = hkcu.create_subkey(REGISTRY_SETTINGS_PATH)?;
        key.set_value("Settings", &json)
    }
}

// ---------------------------------------------------------------------------
// File store (everything else)
// ---------------------------------------------------------------------------

#[cfg(not(windows))]
mod store {
    use super::Settings;
    use crate::util::constants::{APP_ID, SETTINGS_FILE_NAME};
    use std::fs;
    use std::path::PathBuf;

    fn settings_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", APP_ID)
            .map(|dirs| dirs.config_dir().join(SETTINGS_FILE_NAME))
    }

    pub fn load() -> std::io::Result<Option<Settings>> {
        let Some(path) = settings_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&json)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Ok(Some(settings))
    }

    pub fn save(settings: &Settings) -> std::io::Result<()> {
        let Some(path) = settings_path() else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(settings)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(path, json)
    }
}

// =============================================================================
// Unit tests
// =============================================================================
