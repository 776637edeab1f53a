use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::storage::error::StorageSystemError;
use crate::storage::local::LocalStorage;

type Result<T> = std::result::Result<T, StorageSystemError>;

/// Persistent JSON data for one mod.
///
/// Files relative to the mod's own folder go through [`read_json`] and
/// [`write_json`]; data that should survive reinstalling the mod goes
/// through the `*_global` methods, stored as `<data path>/<mod id>/<key>.json`.
///
/// [`read_json`]: DataHelper::read_json
/// [`write_json`]: DataHelper::write_json
#[derive(Debug, Clone)]
pub struct DataHelper {
    local: LocalStorage,
    global: LocalStorage,
}

impl DataHelper {
    pub fn new(mod_directory: impl Into<PathBuf>, global_root: impl Into<PathBuf>) -> Self {
        Self {
            local: LocalStorage::new(mod_directory),
            global: LocalStorage::new(global_root),
        }
    }

    /// Read a JSON file in the mod folder. `Ok(None)` if it doesn't exist.
    pub fn read_json<T: DeserializeOwned>(&self, path: impl AsRef<Path>) -> Result<Option<T>> {
        self.local.read_json(path)
    }

    /// Write a JSON file in the mod folder, replacing it atomically.
    pub fn write_json<T: Serialize>(&self, path: impl AsRef<Path>, value: &T) -> Result<()> {
        self.local.write_json(path, value)
    }

    pub fn read_global<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.global.read_json(Self::global_file(key)?)
    }

    pub fn write_global<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.global.write_json(Self::global_file(key)?, value)
    }

    pub fn remove_global(&self, key: &str) -> Result<()> {
        self.global.remove(Self::global_file(key)?)
    }

    /// Folder holding this mod's global data
    pub fn global_path(&self) -> &Path {
        self.global.base_path()
    }

    fn global_file(key: &str) -> Result<String> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
        if !valid {
            return Err(StorageSystemError::InvalidPath {
                path: PathBuf::from(key),
                reason: "global data keys may only contain letters, digits, '.', '-' and '_'".to_string(),
            });
        }
        Ok(format!("{key}.json"))
    }
}
