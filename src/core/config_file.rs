// ETWSpy - core/config_file.rs
//
// `.etwspy` configuration files: the providers and filters of a session,
// saved and reloaded as versioned JSON. The legacy `.etwconfig` extension
// is accepted on load; saves always use the current format.
//
// Saves are atomic: the document is written to a sibling temp file and
// renamed over the target, so a crash mid-write never corrupts an
// existing config.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::model::{FilterEntry, ProviderConfig};
use crate::util::error::ConfigError;

/// Current config file format version. Bump when a change would make old
/// binaries misread the file; older versions remain loadable.
pub const CONFIG_VERSION: u32 = 1;

/// The on-disk document. Unknown fields are tolerated so configs written by
/// newer minor releases still load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub providers: Vec<ProviderConfig>,

    #[serde(default)]
    pub filters: Vec<FilterEntry>,
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            providers: Vec::new(),
            filters: Vec::new(),
        }
    }
}

impl SessionConfig {
    pub fn new(providers: Vec<ProviderConfig>, filters: Vec<FilterEntry>) -> Self {
        Self {
            version: CONFIG_VERSION,
            providers,
            filters,
        }
    }
}

/// Load and validate a configuration file.
///
/// Every provider GUID is re-validated on load; a config edited by hand with
/// a bad GUID is rejected here rather than at session start.
pub fn load(path: &Path) -> Result<SessionConfig, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut config: SessionConfig =
        serde_json::from_str(&text).map_err(|source| ConfigError::JsonParse {
            path: path.to_path_buf(),
            source,
        })?;

    if config.version > CONFIG_VERSION {
        return Err(ConfigError::UnsupportedVersion {
            path: path.to_path_buf(),
            found: config.version,
            max: CONFIG_VERSION,
        });
    }

    for provider in &mut config.providers {
        provider.validate().map_err(|source| ConfigError::InvalidEntry {
            path: path.to_path_buf(),
            source,
        })?;
    }

    Ok(config)
}

/// Save a configuration file atomically (temp file + rename).
pub fn save(path: &Path, config: &SessionConfig) -> Result<(), ConfigError> {
    let json = serde_json::to_string_pretty(config).map_err(|source| ConfigError::JsonParse {
        path: path.to_path_buf(),
        source,
    })?;

    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, json.as_bytes()).map_err(|source| ConfigError::Io {
        path: temp_path.clone(),
        source,
    })?;
    fs::rename(&temp_path, path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::debug!(path = %path.display(), "Configuration saved");
    Ok(())
}

// =============================================================================
// Unit tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::FilterCategory;

    #[test]
    fn test_unknown_fields_tolerated() {
        let json = r#"{
            "version": 1,
            "providers": [],
            "filters": [],
            "someFutureField": {"nested": true}
        }"#;
        let config: SessionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.version, 1);
        assert!(config.providers.is_empty());
    }

    #[test]
    fn test_missing_fields_default() {
        let config: SessionConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.version, CONFIG_VERSION);
        assert!(config.providers.is_empty());
        assert!(config.filters.is_empty());
    }

    #[test]
    fn test_serialised_form_round_trips() {
        let mut provider = ProviderConfig::new("P", "22FB2CD6-0E7B-422B-A0C7-2FAD1FD0E716");
        provider.keywords_any = 0x10;
        provider.event_ids = [1u16, 2, 3].into_iter().collect();
        let filter = FilterEntry {
            provider: String::new(),
            category: FilterCategory::EventId,
            value: "1-3".to_string(),
            include: true,
        };

        let original = SessionConfig::new(vec![provider], vec![filter]);
        let json = serde_json::to_string(&original).unwrap();
        let loaded: SessionConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(loaded.providers, original.providers);
        assert_eq!(loaded.filters, original.filters);
    }
}
