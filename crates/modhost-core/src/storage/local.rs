use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;

use crate::storage::error::StorageSystemError;

type Result<T> = std::result::Result<T, StorageSystemError>;

/// A file store rooted at one directory.
///
/// Every path handed to it is relative to the root; absolute paths and
/// paths climbing out with `..` are rejected, so a mod handed a store over
/// its own folder cannot reach any other mod's files.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Create a new store rooted at `base_path`
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Resolve a relative path against the root, refusing anything that escapes it.
    pub fn resolve_path(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(StorageSystemError::InvalidPath {
                path: path.to_path_buf(),
                reason: "path is empty".to_string(),
            });
        }
        for component in path.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                Component::ParentDir => {
                    return Err(StorageSystemError::InvalidPath {
                        path: path.to_path_buf(),
                        reason: "path must not contain '..'".to_string(),
                    });
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(StorageSystemError::InvalidPath {
                        path: path.to_path_buf(),
                        reason: "path must be relative".to_string(),
                    });
                }
            }
        }
        Ok(self.base_path.join(path))
    }

    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        self.resolve_path(path).map(|p| p.exists()).unwrap_or(false)
    }

    pub fn read_to_string(&self, path: impl AsRef<Path>) -> Result<String> {
        let full_path = self.resolve_path(path)?;
        fs::read_to_string(&full_path)
            .map_err(|e| StorageSystemError::io(e, "read_to_string", full_path))
    }

    /// Write `contents` atomically: a temp file in the target's directory is
    /// persisted over the target once fully written.
    pub fn write_bytes(&self, path: impl AsRef<Path>, contents: &[u8]) -> Result<()> {
        let full_path = self.resolve_path(path)?;
        let parent = match full_path.parent() {
            Some(parent) => parent.to_path_buf(),
            None => {
                return Err(StorageSystemError::InvalidPath {
                    path: full_path,
                    reason: "cannot write to path without parent directory".to_string(),
                });
            }
        };
        fs::create_dir_all(&parent)
            .map_err(|e| StorageSystemError::io(e, "create_dir_all", parent.clone()))?;

        let mut temp_file = NamedTempFile::new_in(&parent)
            .map_err(|e| StorageSystemError::io(e, "create_temp_file", parent.clone()))?;
        temp_file
            .write_all(contents)
            .map_err(|e| StorageSystemError::io(e, "write_to_temp_file", temp_file.path().to_path_buf()))?;
        temp_file
            .persist(&full_path)
            .map_err(|e| StorageSystemError::io(e.error, "persist_temp_file", full_path.clone()))?;
        Ok(())
    }

    /// Read and deserialize a JSON file. A missing file is `Ok(None)`.
    pub fn read_json<T: DeserializeOwned>(&self, path: impl AsRef<Path>) -> Result<Option<T>> {
        let full_path = self.resolve_path(path)?;
        if !full_path.is_file() {
            return Ok(None);
        }
        let content = fs::read_to_string(&full_path)
            .map_err(|e| StorageSystemError::io(e, "read_json", full_path.clone()))?;
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| StorageSystemError::DeserializationError {
                format: "json".to_string(),
                path: full_path,
                source: Box::new(e),
            })
    }

    pub fn write_json<T: Serialize>(&self, path: impl AsRef<Path>, value: &T) -> Result<()> {
        let content = serde_json::to_vec_pretty(value).map_err(|e| {
            StorageSystemError::SerializationError {
                format: "json".to_string(),
                source: Box::new(e),
            }
        })?;
        self.write_bytes(path, &content)
    }

    /// Delete a file if present.
    pub fn remove(&self, path: impl AsRef<Path>) -> Result<()> {
        let full_path = self.resolve_path(path)?;
        if full_path.is_file() {
            fs::remove_file(&full_path)
                .map_err(|e| StorageSystemError::io(e, "remove_file", full_path))?;
        }
        Ok(())
    }
}
