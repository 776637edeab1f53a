use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::kernel::constants::DEFAULT_WEB_API_URL;
use crate::storage::error::StorageSystemError;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// JSON format (.json)
    Json,
    /// YAML format (.yaml, .yml) - requires "yaml-config" feature
    #[cfg(feature = "yaml-config")]
    Yaml,
    /// TOML format (.toml) - requires "toml-config" feature
    #[cfg(feature = "toml-config")]
    Toml,
}

impl ConfigFormat {
    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => "yaml",
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => "toml",
        }
    }

    /// Determine format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_lowercase().as_str() {
                "json" => Some(ConfigFormat::Json),
                #[cfg(feature = "yaml-config")]
                "yaml" | "yml" => Some(ConfigFormat::Yaml),
                #[cfg(feature = "toml-config")]
                "toml" => Some(ConfigFormat::Toml),
                _ => None,
            })
    }

    /// Parse a document into a generic JSON value tree.
    fn parse(&self, data: &str, path: &Path) -> Result<Value, StorageSystemError> {
        match self {
            ConfigFormat::Json => serde_json::from_str(data).map_err(|e| self.deserialize_error(path, e)),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::from_str(data).map_err(|e| self.deserialize_error(path, e)),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::from_str(data).map_err(|e| self.deserialize_error(path, e)),
        }
    }

    fn deserialize_error<E>(&self, path: &Path, source: E) -> StorageSystemError
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        StorageSystemError::DeserializationError {
            format: self.extension().to_string(),
            path: path.to_path_buf(),
            source: Box::new(source),
        }
    }

    fn serialize_error<E>(&self, source: E) -> StorageSystemError
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        StorageSystemError::SerializationError {
            format: self.extension().to_string(),
            source: Box::new(source),
        }
    }
}

/// Host settings that affect mod loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct HostSettings {
    /// Whether to run the background update check
    pub check_for_updates: bool,
    /// Base URL of the update-check web API
    pub web_api_base_url: String,
    /// Mod IDs excluded from update checks and from the no-update-keys warning
    pub suppress_update_checks: Vec<String>,
    /// Emit verbose logs for every mod
    pub developer_mode: bool,
    /// Mod IDs whose verbose logs are emitted
    pub verbose_logging: Vec<String>,
    /// Locale used by translation helpers
    pub locale: String,
    /// Root for global per-mod data; derived from the mods path when unset
    pub data_path: Option<PathBuf>,
    /// Include the paranoid warning group in reports
    pub paranoid_warnings: bool,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            check_for_updates: true,
            web_api_base_url: DEFAULT_WEB_API_URL.to_string(),
            suppress_update_checks: Vec::new(),
            developer_mode: false,
            verbose_logging: Vec::new(),
            locale: "en".to_string(),
            data_path: None,
            paranoid_warnings: false,
        }
    }
}

impl HostSettings {
    /// Lower-cased set of suppressed mod IDs.
    pub fn suppressed_update_ids(&self) -> HashSet<String> {
        self.suppress_update_checks
            .iter()
            .map(|id| id.trim().to_lowercase())
            .filter(|id| !id.is_empty())
            .collect()
    }

    pub fn is_update_check_suppressed(&self, id: &str) -> bool {
        self.suppress_update_checks
            .iter()
            .any(|suppressed| suppressed.trim().eq_ignore_ascii_case(id))
    }

    pub fn is_verbose(&self, id: &str) -> bool {
        self.developer_mode || self.verbose_logging.iter().any(|v| v.eq_ignore_ascii_case(id))
    }

    /// Load settings from a default file overlaid by an optional user file.
    ///
    /// Missing files contribute nothing; keys present in the user file
    /// replace the same keys in the default file.
    pub fn load(default_path: Option<&Path>, user_path: Option<&Path>) -> Result<Self, StorageSystemError> {
        let mut merged = Map::new();
        for path in [default_path, user_path].into_iter().flatten() {
            if let Some(Value::Object(values)) = read_settings_file(path)? {
                for (key, value) in values {
                    merged.insert(key, value);
                }
            }
        }
        serde_json::from_value(Value::Object(merged)).map_err(|e| {
            StorageSystemError::DeserializationError {
                format: "settings".to_string(),
                path: user_path.or(default_path).map(Path::to_path_buf).unwrap_or_default(),
                source: Box::new(e),
            }
        })
    }

    /// Save settings in the format implied by the file extension.
    pub fn save(&self, path: &Path) -> Result<(), StorageSystemError> {
        let format = ConfigFormat::from_path(path)
            .ok_or_else(|| StorageSystemError::UnsupportedConfigFormat(path.to_path_buf()))?;
        let content = match format {
            ConfigFormat::Json => serde_json::to_string_pretty(self).map_err(|e| format.serialize_error(e))?,
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::to_string(self).map_err(|e| format.serialize_error(e))?,
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::to_string_pretty(self).map_err(|e| format.serialize_error(e))?,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| StorageSystemError::io(e, "create_dir_all", parent.to_path_buf()))?;
        }
        fs::write(path, content).map_err(|e| StorageSystemError::io(e, "write_settings", path.to_path_buf()))
    }
}

fn read_settings_file(path: &Path) -> Result<Option<Value>, StorageSystemError> {
    if !path.is_file() {
        log::debug!("Settings file {} not found; using defaults", path.display());
        return Ok(None);
    }
    let format = ConfigFormat::from_path(path)
        .ok_or_else(|| StorageSystemError::UnsupportedConfigFormat(path.to_path_buf()))?;
    let content = fs::read_to_string(path)
        .map_err(|e| StorageSystemError::io(e, "read_settings", path.to_path_buf()))?;
    format.parse(&content, path).map(Some)
}
