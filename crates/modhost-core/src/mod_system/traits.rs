use std::error::Error as StdError;
use std::sync::Arc;

use crate::mod_system::helpers::ModHelper;
use crate::mod_system::helpers::translation::TranslationMap;
use crate::mod_system::metadata::ModMetadata;
use crate::proxy::ApiObject;

/// Error type mod code returns to the host
pub type ModResult<T> = Result<T, Box<dyn StdError + Send + Sync>>;

/// Contract every code mod's entry type implements.
pub trait Mod: Send + Sync {
    /// Called once, after every mod is loaded, in dependency order.
    ///
    /// An error or panic here is logged against this mod but does not
    /// unload it; dependents still see it as loaded.
    fn entry(&mut self, helper: Arc<ModHelper>) -> ModResult<()>;

    /// The API object this mod shares with other mods, if any.
    fn api(&self) -> ModResult<Option<ApiObject>> {
        Ok(None)
    }
}

/// Host-application specific steps of the load pass.
///
/// Both hooks are isolated per mod: an error or panic is logged against the
/// mod and loading continues.
pub trait HostHooks: Send + Sync {
    /// Translation data for a mod, keyed by locale then translation key.
    fn load_translations(&self, _metadata: &ModMetadata) -> ModResult<TranslationMap> {
        Ok(TranslationMap::new())
    }

    /// Hook the mod's content interceptors into the host. Runs after every
    /// entry callback has completed.
    fn wire_interceptors(&self, _metadata: &ModMetadata, _entry: &Arc<dyn Mod>) -> ModResult<()> {
        Ok(())
    }
}

/// Hooks that do nothing, for hosts with no content pipeline.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHostHooks;

impl HostHooks for NoopHostHooks {}
