pub mod context;
pub mod kernel;
pub mod mod_system;
pub mod proxy;
pub mod storage;
pub mod update;

// Re-export the types hosts and mods use most
pub use context::{ModContext, ModContextBuilder};
pub use kernel::error::{Error, Result};
pub use mod_system::helpers::ModHelper;
pub use mod_system::{
    HostHooks, LoadReport, LoadSummary, Manifest, Mod, ModHandle, ModMetadata, ModRegistry, ModResult, ModStatus,
    ModSystemError, StagedLoader,
};
pub use proxy::{ApiObject, ApiTable, BridgeInterface, ProxyError, ProxyFactory, Value};
pub use storage::HostSettings;
pub use update::{UpdateChecker, WebApiClient};

#[cfg(test)]
mod tests;
