//! # Mod Context
//!
//! [`ModContext`] owns every piece of state the pipeline shares: the
//! registry, the proxy cache, the command table, settings and the
//! cancellation signal. Nothing here is global, so independent contexts
//! (one per test, say) never see each other's mods.
use std::path::{Path, PathBuf};
use std::sync::Arc;

use semver::Version;
use tokio_util::sync::CancellationToken;

use crate::kernel::constants::{API_VERSION, DEFAULT_DATA_DIR_NAME};
use crate::mod_system::compat::{BinaryValidator, DylibValidator};
use crate::mod_system::helpers::{CommandManager, LogCrateSink, LogSink};
use crate::mod_system::registry::ModRegistry;
use crate::mod_system::traits::{HostHooks, NoopHostHooks};
use crate::mod_system::version::parse_lenient;
use crate::proxy::ProxyFactory;
use crate::storage::config::HostSettings;

/// Host API version this build of the library implements.
pub fn host_api_version() -> Version {
    parse_lenient(API_VERSION).unwrap_or_else(|| Version::new(0, 0, 0))
}

pub struct ModContext {
    mods_root: PathBuf,
    host_api_version: Version,
    settings: Arc<HostSettings>,
    // Cached proxies and command handlers hold objects created by mod code,
    // so they drop before the registry releases the loaded modules.
    proxies: ProxyFactory,
    commands: Arc<CommandManager>,
    registry: Arc<ModRegistry>,
    validator: Arc<dyn BinaryValidator>,
    hooks: Arc<dyn HostHooks>,
    log_sink: Arc<dyn LogSink>,
    cancellation: CancellationToken,
}

impl ModContext {
    pub fn builder(mods_root: impl Into<PathBuf>) -> ModContextBuilder {
        ModContextBuilder::new(mods_root)
    }

    pub fn mods_root(&self) -> &Path {
        &self.mods_root
    }

    pub fn host_api_version(&self) -> &Version {
        &self.host_api_version
    }

    pub fn settings(&self) -> &Arc<HostSettings> {
        &self.settings
    }

    pub fn registry(&self) -> &Arc<ModRegistry> {
        &self.registry
    }

    pub fn proxies(&self) -> &ProxyFactory {
        &self.proxies
    }

    pub fn commands(&self) -> &Arc<CommandManager> {
        &self.commands
    }

    pub fn validator(&self) -> &Arc<dyn BinaryValidator> {
        &self.validator
    }

    pub fn hooks(&self) -> &Arc<dyn HostHooks> {
        &self.hooks
    }

    pub fn log_sink(&self) -> &Arc<dyn LogSink> {
        &self.log_sink
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Root of global per-mod data: the configured path, or a folder next
    /// to the mods root.
    pub fn data_path(&self) -> PathBuf {
        match &self.settings.data_path {
            Some(path) => path.clone(),
            None => self
                .mods_root
                .parent()
                .unwrap_or(&self.mods_root)
                .join(DEFAULT_DATA_DIR_NAME),
        }
    }
}

impl std::fmt::Debug for ModContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModContext")
            .field("mods_root", &self.mods_root)
            .field("host_api_version", &self.host_api_version.to_string())
            .field("registered", &self.registry.len())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

pub struct ModContextBuilder {
    mods_root: PathBuf,
    host_api_version: Version,
    settings: HostSettings,
    validator: Option<Arc<dyn BinaryValidator>>,
    hooks: Arc<dyn HostHooks>,
    log_sink: Arc<dyn LogSink>,
    cancellation: CancellationToken,
}

impl ModContextBuilder {
    pub fn new(mods_root: impl Into<PathBuf>) -> Self {
        Self {
            mods_root: mods_root.into(),
            host_api_version: host_api_version(),
            settings: HostSettings::default(),
            validator: None,
            hooks: Arc::new(NoopHostHooks),
            log_sink: Arc::new(LogCrateSink),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn host_api_version(mut self, version: Version) -> Self {
        self.host_api_version = version;
        self
    }

    pub fn settings(mut self, settings: HostSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Defaults to a [`DylibValidator`] for the host API version.
    pub fn validator(mut self, validator: Arc<dyn BinaryValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn hooks(mut self, hooks: Arc<dyn HostHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.log_sink = sink;
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn build(self) -> ModContext {
        let validator = self
            .validator
            .unwrap_or_else(|| Arc::new(DylibValidator::new(self.host_api_version.clone())));
        ModContext {
            mods_root: self.mods_root,
            host_api_version: self.host_api_version,
            settings: Arc::new(self.settings),
            registry: Arc::new(ModRegistry::new()),
            proxies: ProxyFactory::new(),
            commands: Arc::new(CommandManager::new()),
            validator,
            hooks: self.hooks,
            log_sink: self.log_sink,
            cancellation: self.cancellation,
        }
    }
}
