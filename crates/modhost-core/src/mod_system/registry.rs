use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use log::trace;
use parking_lot::RwLock;

use crate::mod_system::compat::ModuleId;
use crate::mod_system::error::RegistryError;
use crate::mod_system::metadata::{ModHandle, ModStatus};

/// Which registered mods [`ModRegistry::get_all`] returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModFilter {
    All,
    ContentBundles,
    CodeMods,
}

/// Runtime state of every registered mod.
///
/// IDs are compared case-insensitively. The two readiness flags start
/// false and are each set exactly once.
#[derive(Default)]
pub struct ModRegistry {
    mods: RwLock<HashMap<String, ModHandle>>,
    order: RwLock<Vec<String>>,
    modules: RwLock<HashMap<ModuleId, String>>,
    all_loaded: AtomicBool,
    all_initialized: AtomicBool,
}

impl ModRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mod. Registering an ID twice is a logic error.
    pub fn add(&self, handle: ModHandle) -> Result<(), RegistryError> {
        let key = {
            let metadata = handle.read();
            match metadata.unique_id() {
                Some(id) => id.to_lowercase(),
                None => return Err(RegistryError::MissingId(metadata.display_name().to_string())),
            }
        };

        let mut mods = self.mods.write();
        if mods.contains_key(&key) {
            return Err(RegistryError::AlreadyRegistered(key));
        }
        trace!("Registered mod '{key}'");
        mods.insert(key.clone(), handle);
        self.order.write().push(key);
        Ok(())
    }

    /// Drop a mod from the ID index. Leaves the readiness flags alone.
    pub fn remove(&self, id: &str) -> Option<ModHandle> {
        let key = id.to_lowercase();
        let removed = self.mods.write().remove(&key);
        if removed.is_some() {
            self.order.write().retain(|k| k != &key);
            trace!("Removed mod '{key}' from the registry");
        }
        removed
    }

    pub fn get(&self, id: &str) -> Option<ModHandle> {
        self.mods.read().get(&id.to_lowercase()).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.mods.read().contains_key(&id.to_lowercase())
    }

    /// Registered mods in registration order.
    pub fn get_all(&self, filter: ModFilter) -> Vec<ModHandle> {
        let mods = self.mods.read();
        self.order
            .read()
            .iter()
            .filter_map(|key| mods.get(key))
            .filter(|handle| match filter {
                ModFilter::All => true,
                ModFilter::ContentBundles => handle.read().is_content_bundle(),
                ModFilter::CodeMods => !handle.read().is_content_bundle(),
            })
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.mods.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.mods.read().is_empty()
    }

    /// Whether `id` is registered and finished loading.
    pub fn is_loaded(&self, id: &str) -> bool {
        self.get(id)
            .is_some_and(|handle| handle.read().status() == ModStatus::Loaded)
    }

    /// Remember which mod a loaded binary belongs to.
    pub fn track_module(&self, module: ModuleId, owner_id: &str) {
        self.modules.write().insert(module, owner_id.to_lowercase());
    }

    /// The mod a binary belongs to, for error attribution.
    pub fn owner_of_module(&self, module: &ModuleId) -> Option<ModHandle> {
        let owner = self.modules.read().get(module).cloned()?;
        self.get(&owner)
    }

    pub fn is_all_loaded(&self) -> bool {
        self.all_loaded.load(Ordering::Acquire)
    }

    pub fn mark_all_loaded(&self) -> Result<(), RegistryError> {
        Self::set_once(&self.all_loaded, "all loaded")
    }

    pub fn is_all_initialized(&self) -> bool {
        self.all_initialized.load(Ordering::Acquire)
    }

    pub fn mark_all_initialized(&self) -> Result<(), RegistryError> {
        Self::set_once(&self.all_initialized, "all initialized")
    }

    fn set_once(flag: &AtomicBool, name: &'static str) -> Result<(), RegistryError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| RegistryError::FlagAlreadySet(name))
    }

    /// Content bundles whose owner is `owner_id`.
    ///
    /// Fails until every mod has loaded, since the list could still change.
    pub fn content_bundles_for(&self, owner_id: &str) -> Result<Vec<ModHandle>, RegistryError> {
        if !self.is_all_loaded() {
            return Err(RegistryError::NotReady);
        }
        Ok(self
            .get_all(ModFilter::ContentBundles)
            .into_iter()
            .filter(|handle| {
                handle
                    .read()
                    .manifest()
                    .and_then(|m| m.content_bundle_for.as_deref())
                    .is_some_and(|owner| owner.eq_ignore_ascii_case(owner_id))
            })
            .collect())
    }
}
