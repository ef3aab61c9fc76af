//! Settings management

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strata_core::ecs::StoragePolicies;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Runtime settings. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub storage: StoragePolicies,
    /// `tracing` level filter: error, warn, info, debug or trace.
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            storage: StoragePolicies::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_json_str(&text)?;
        tracing::debug!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    pub fn from_json_str(text: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json_string(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::ecs::{ChunkAllocationPolicy, StorageRemovalPolicy};

    #[test]
    fn test_empty_document_gives_defaults() {
        let settings = Settings::from_json_str("{}").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.storage.chunk_capacity(), 128);
        assert_eq!(settings.log_level, "info");
    }

    #[test]
    fn test_partial_storage_section() {
        let settings = Settings::from_json_str(
            r#"{ "storage": { "allocation": "ScanFirstFit", "removal": "Stable" }, "log_level": "debug" }"#,
        )
        .unwrap();
        assert_eq!(settings.storage.chunk_capacity(), 128);
        assert_eq!(settings.storage.allocation(), ChunkAllocationPolicy::ScanFirstFit);
        assert_eq!(settings.storage.removal(), StorageRemovalPolicy::Stable);
        assert_eq!(settings.log_level, "debug");
    }

    #[test]
    fn test_zero_capacity_is_a_parse_error() {
        let err = Settings::from_json_str(r#"{ "storage": { "chunk_capacity": 0 } }"#).unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }

    #[test]
    fn test_load_round_trip_and_missing_file() {
        let path = std::env::temp_dir()
            .join(format!("strata-settings-{}.json", std::process::id()));
        let mut settings = Settings::default();
        settings.log_level = "trace".to_string();
        fs::write(&path, settings.to_json_string().unwrap()).unwrap();

        let loaded = Settings::load(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(loaded, settings);

        assert!(matches!(Settings::load(&path), Err(SettingsError::Io { .. })));
    }
}
