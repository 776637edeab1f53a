use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::mod_system::error::RegistryError;
use crate::mod_system::manifest::Manifest;
use crate::mod_system::registry::ModRegistry;
use crate::storage::error::StorageSystemError;
use crate::storage::local::LocalStorage;

/// A content bundle owned by the calling mod.
#[derive(Debug, Clone)]
pub struct ContentPack {
    manifest: Arc<Manifest>,
    storage: LocalStorage,
}

impl ContentPack {
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn directory(&self) -> &Path {
        self.storage.base_path()
    }

    pub fn has_file(&self, path: impl AsRef<Path>) -> bool {
        self.storage.exists(path)
    }

    /// Read a JSON file from the bundle folder. `Ok(None)` if missing.
    pub fn read_json<T: DeserializeOwned>(&self, path: impl AsRef<Path>) -> Result<Option<T>, StorageSystemError> {
        self.storage.read_json(path)
    }
}

/// Access to the content bundles that name this mod as their owner.
#[derive(Clone)]
pub struct ContentPackHelper {
    owner_id: String,
    registry: Arc<ModRegistry>,
}

impl ContentPackHelper {
    pub fn new(owner_id: impl Into<String>, registry: Arc<ModRegistry>) -> Self {
        Self {
            owner_id: owner_id.into(),
            registry,
        }
    }

    /// Owned bundles that loaded. Fails before every mod has loaded.
    pub fn owned(&self) -> Result<Vec<ContentPack>, RegistryError> {
        let bundles = self.registry.content_bundles_for(&self.owner_id)?;
        Ok(bundles
            .iter()
            .filter_map(|handle| {
                let metadata = handle.read();
                let manifest = metadata.manifest()?.clone();
                Some(ContentPack {
                    manifest,
                    storage: LocalStorage::new(PathBuf::from(metadata.directory())),
                })
            })
            .collect())
    }
}

impl std::fmt::Debug for ContentPackHelper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentPackHelper")
            .field("owner_id", &self.owner_id)
            .finish()
    }
}
