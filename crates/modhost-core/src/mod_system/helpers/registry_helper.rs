use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::mod_system::error::{ModSystemError, RegistryError};
use crate::mod_system::manifest::Manifest;
use crate::mod_system::metadata::{ModHandle, ModStatus};
use crate::mod_system::registry::{ModFilter, ModRegistry};
use crate::proxy::{ApiObject, BridgeInterface, MethodSignature, ProxyFactory};

/// Read-only snapshot of a registered mod.
#[derive(Debug, Clone)]
pub struct ModInfo {
    pub manifest: Arc<Manifest>,
    pub directory: PathBuf,
    pub status: ModStatus,
}

impl ModInfo {
    fn from_handle(handle: &ModHandle) -> Option<Self> {
        let metadata = handle.read();
        Some(Self {
            manifest: metadata.manifest()?.clone(),
            directory: metadata.directory().to_path_buf(),
            status: metadata.status(),
        })
    }

    pub fn is_content_bundle(&self) -> bool {
        self.manifest.is_content_bundle()
    }
}

fn api_object(registry: &ModRegistry, id: &str) -> Result<Option<ApiObject>, RegistryError> {
    if !registry.is_all_initialized() {
        return Err(RegistryError::NotInitialized);
    }
    Ok(registry.get(id).and_then(|handle| handle.read().api().cloned()))
}

/// Lookup of other mods and their APIs.
#[derive(Clone)]
pub struct RegistryHelper {
    registry: Arc<ModRegistry>,
    proxies: ProxyFactory,
}

impl RegistryHelper {
    pub fn new(registry: Arc<ModRegistry>, proxies: ProxyFactory) -> Self {
        Self { registry, proxies }
    }

    pub fn get(&self, id: &str) -> Option<ModInfo> {
        self.registry.get(id).as_ref().and_then(ModInfo::from_handle)
    }

    pub fn get_all(&self) -> Vec<ModInfo> {
        self.registry
            .get_all(ModFilter::All)
            .iter()
            .filter_map(ModInfo::from_handle)
            .collect()
    }

    pub fn is_loaded(&self, id: &str) -> bool {
        self.registry.is_loaded(id)
    }

    /// The raw API object of mod `id`, `Ok(None)` if it has none.
    ///
    /// Fails until every mod's entry has run.
    pub fn get_api_object(&self, id: &str) -> Result<Option<ApiObject>, RegistryError> {
        api_object(&self.registry, id)
    }

    /// Mod `id`'s API, bridged to an interface declared by the caller.
    pub fn get_api<I: BridgeInterface>(&self, id: &str) -> Result<Option<I>, ModSystemError> {
        match self.get_api_object(id)? {
            Some(api) => Ok(Some(self.proxies.create_as::<I>(&api)?)),
            None => Ok(None),
        }
    }
}

impl fmt::Debug for RegistryHelper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryHelper")
            .field("registered", &self.registry.len())
            .finish()
    }
}

/// Introspection of other mods' APIs.
#[derive(Clone)]
pub struct ReflectionHelper {
    registry: Arc<ModRegistry>,
    proxies: ProxyFactory,
}

impl ReflectionHelper {
    pub fn new(registry: Arc<ModRegistry>, proxies: ProxyFactory) -> Self {
        Self { registry, proxies }
    }

    /// Member signatures of mod `id`'s API, `Ok(None)` if it has none.
    pub fn describe_api(&self, id: &str) -> Result<Option<Vec<MethodSignature>>, RegistryError> {
        Ok(api_object(&self.registry, id)?.map(|api| api.methods().to_vec()))
    }

    /// Type name the provider reports for its API object.
    pub fn api_type_name(&self, id: &str) -> Result<Option<String>, RegistryError> {
        Ok(api_object(&self.registry, id)?.map(|api| api.type_name().to_string()))
    }

    /// Whether `I` would bridge to mod `id`'s API, without creating a proxy.
    ///
    /// `Ok(false)` when the mod has no API; a structural mismatch is
    /// returned as the error naming the unmatched member.
    pub fn check_bridge<I: BridgeInterface>(&self, id: &str) -> Result<bool, ModSystemError> {
        match api_object(&self.registry, id)? {
            Some(api) => {
                self.proxies.check(&I::shape(), &api)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl fmt::Debug for ReflectionHelper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReflectionHelper").finish_non_exhaustive()
    }
}
