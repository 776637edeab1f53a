//! # Binary Compatibility
//!
//! The boundary between the loader and mod binaries. A [`BinaryValidator`]
//! turns an entry file into a [`LoadedModule`]: the set of entry factories
//! the binary registered, plus any warnings about what its code does.
//!
//! Mod libraries register explicitly through two exported symbols, both
//! generated by [`declare_mod!`](crate::declare_mod):
//! - `_modhost_api_version() -> &'static str`, the API the mod was built against;
//! - `_modhost_register(&mut ModuleRegistrar)`, which adds the entry factories.
//!
//! Both use the Rust ABI, so a mod library must be built with the same
//! compiler and `modhost-core` version as the host.
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;

use libloading::{Library, Symbol};
use log::trace;
use semver::Version;

use crate::kernel::constants::{API_VERSION_SYMBOL, REGISTER_SYMBOL};
use crate::mod_system::error::BinaryError;
use crate::mod_system::metadata::ModWarning;
use crate::mod_system::traits::Mod;
use crate::mod_system::version::{is_api_compatible, parse_lenient};
use crate::proxy::object::panic_message;

/// Identity of a loaded binary, used to attribute errors to its owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(String);

impl ModuleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn from_path(path: &Path) -> Self {
        Self(path.display().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

type FactoryFn = Box<dyn Fn() -> Box<dyn Mod> + Send + Sync>;

/// One registered entry type.
pub struct EntryFactory {
    name: String,
    factory: FactoryFn,
}

impl EntryFactory {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Create the entry instance. May panic inside mod code.
    pub fn instantiate(&self) -> Box<dyn Mod> {
        (self.factory)()
    }
}

impl fmt::Debug for EntryFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryFactory").field("name", &self.name).finish()
    }
}

/// Collects what a mod binary registers.
#[derive(Debug, Default)]
pub struct ModuleRegistrar {
    entries: Vec<EntryFactory>,
    warnings: BTreeSet<ModWarning>,
}

impl ModuleRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entry type built by `factory`.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Mod> + Send + Sync + 'static,
    {
        self.entries.push(EntryFactory {
            name: name.into(),
            factory: Box::new(factory),
        });
    }

    /// Register an entry type constructed with `Default`.
    pub fn register_default<M>(&mut self, name: impl Into<String>)
    where
        M: Mod + Default + 'static,
    {
        self.register(name, || Box::new(M::default()) as Box<dyn Mod>);
    }

    /// Flag something the binary does that users should know about.
    pub fn warn(&mut self, warning: ModWarning) {
        self.warnings.insert(warning);
    }

    pub fn entry_names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }
}

/// A binary accepted by the validator.
pub struct LoadedModule {
    pub id: ModuleId,
    pub entries: Vec<EntryFactory>,
    pub warnings: BTreeSet<ModWarning>,
    // Declared last so it drops after the factories that point into it
    pub library: Option<Arc<Library>>,
}

impl LoadedModule {
    pub fn new(id: ModuleId, registrar: ModuleRegistrar) -> Self {
        Self {
            id,
            entries: registrar.entries,
            warnings: registrar.warnings,
            library: None,
        }
    }

    pub fn entry_names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }
}

impl fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModule")
            .field("id", &self.id)
            .field("entries", &self.entry_names())
            .field("warnings", &self.warnings)
            .field("dynamic", &self.library.is_some())
            .finish()
    }
}

/// Shown to users when a binary can never load as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncompatibilityReport {
    pub message: String,
    /// Where to find a fixed version, if known
    pub remediation_url: Option<String>,
}

/// Why a validator refused a binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinaryRejection {
    /// Permanent; the user must replace the mod
    Incompatible(IncompatibilityReport),
    /// Technical failure such as a missing file or a bad format
    LoadFailed { message: String },
}

impl BinaryRejection {
    pub fn load_failed(message: impl Into<String>) -> Self {
        BinaryRejection::LoadFailed { message: message.into() }
    }

    /// Split into the per-mod error and its technical detail.
    pub fn into_error(self) -> (BinaryError, Option<String>) {
        match self {
            BinaryRejection::Incompatible(report) => (
                BinaryError::Incompatible {
                    url: report.remediation_url,
                },
                Some(report.message),
            ),
            BinaryRejection::LoadFailed { message } => (BinaryError::LoadFailed, Some(message)),
        }
    }
}

/// The binary-compatibility collaborator.
pub trait BinaryValidator: Send + Sync {
    /// Cheap structural check run during preload. Must not execute mod code.
    fn probe(&self, _path: &Path) -> Result<(), BinaryError> {
        Ok(())
    }

    /// Load the binary and collect its registrations.
    fn validate(&self, path: &Path) -> Result<LoadedModule, BinaryRejection>;
}

type ApiVersionFn = extern "Rust" fn() -> &'static str;
type RegisterFn = extern "Rust" fn(&mut ModuleRegistrar);

/// Loads mods as platform dynamic libraries.
#[derive(Debug, Clone)]
pub struct DylibValidator {
    host_api_version: Version,
}

impl DylibValidator {
    pub fn new(host_api_version: Version) -> Self {
        Self { host_api_version }
    }
}

impl BinaryValidator for DylibValidator {
    fn probe(&self, path: &Path) -> Result<(), BinaryError> {
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        if !extension.eq_ignore_ascii_case(std::env::consts::DLL_EXTENSION) {
            let found = if extension.is_empty() {
                "no file extension".to_string()
            } else {
                format!(".{extension} file")
            };
            return Err(BinaryError::LegacyPackaging(found));
        }
        Ok(())
    }

    fn validate(&self, path: &Path) -> Result<LoadedModule, BinaryRejection> {
        if !path.is_file() {
            return Err(BinaryRejection::load_failed(format!(
                "entry file not found: {}",
                path.display()
            )));
        }

        trace!("Loading mod library {}", path.display());
        // SAFETY: loading a library runs its initializers; mods are trusted in-process code.
        let library = unsafe { Library::new(path) }
            .map_err(|e| BinaryRejection::load_failed(format!("failed to load {}: {e}", path.display())))?;

        let version_fn: ApiVersionFn = {
            // SAFETY: the symbol type matches the one declare_mod! exports.
            let symbol: Symbol<ApiVersionFn> = unsafe { library.get(API_VERSION_SYMBOL) }.map_err(|e| {
                BinaryRejection::Incompatible(IncompatibilityReport {
                    message: format!("the library doesn't export an API version: {e}"),
                    remediation_url: None,
                })
            })?;
            *symbol
        };
        let built_against = panic::catch_unwind(|| version_fn().to_string())
            .map_err(|payload| BinaryRejection::load_failed(panic_message(payload.as_ref())))?;
        let compatible = parse_lenient(&built_against)
            .is_some_and(|version| is_api_compatible(&self.host_api_version, &version));
        if !compatible {
            return Err(BinaryRejection::Incompatible(IncompatibilityReport {
                message: format!(
                    "built against mod API {built_against}, but the host provides {}",
                    self.host_api_version
                ),
                remediation_url: None,
            }));
        }

        let register_fn: RegisterFn = {
            // SAFETY: as above.
            let symbol: Symbol<RegisterFn> = unsafe { library.get(REGISTER_SYMBOL) }
                .map_err(|e| BinaryRejection::load_failed(format!("the library has no registration function: {e}")))?;
            *symbol
        };
        let mut registrar = ModuleRegistrar::new();
        panic::catch_unwind(AssertUnwindSafe(|| register_fn(&mut registrar))).map_err(|payload| {
            BinaryRejection::load_failed(format!(
                "registration panicked: {}",
                panic_message(payload.as_ref())
            ))
        })?;

        let mut module = LoadedModule::new(ModuleId::from_path(path), registrar);
        module.library = Some(Arc::new(library));
        Ok(module)
    }
}

type RegisterClosure = Arc<dyn Fn(&mut ModuleRegistrar) + Send + Sync>;

/// Serves mods linked into the host, keyed by entry file name.
///
/// Also the validator of choice for tests, since it needs no real binaries
/// on disk.
#[derive(Default, Clone)]
pub struct StaticModuleValidator {
    modules: HashMap<String, RegisterClosure>,
    rejections: HashMap<String, BinaryRejection>,
}

impl StaticModuleValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `register` for entry files named `file_name` (case-insensitive).
    pub fn with_module<F>(mut self, file_name: &str, register: F) -> Self
    where
        F: Fn(&mut ModuleRegistrar) + Send + Sync + 'static,
    {
        self.modules.insert(file_name.to_lowercase(), Arc::new(register));
        self
    }

    /// Reject entry files named `file_name`.
    pub fn with_rejection(mut self, file_name: &str, rejection: BinaryRejection) -> Self {
        self.rejections.insert(file_name.to_lowercase(), rejection);
        self
    }
}

impl BinaryValidator for StaticModuleValidator {
    fn validate(&self, path: &Path) -> Result<LoadedModule, BinaryRejection> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if let Some(rejection) = self.rejections.get(&file_name) {
            return Err(rejection.clone());
        }
        let register = self
            .modules
            .get(&file_name)
            .ok_or_else(|| BinaryRejection::load_failed(format!("no module is registered for '{file_name}'")))?;

        let mut registrar = ModuleRegistrar::new();
        panic::catch_unwind(AssertUnwindSafe(|| register(&mut registrar))).map_err(|payload| {
            BinaryRejection::load_failed(format!(
                "registration panicked: {}",
                panic_message(payload.as_ref())
            ))
        })?;
        Ok(LoadedModule::new(ModuleId::new(format!("static:{file_name}")), registrar))
    }
}

impl fmt::Debug for StaticModuleValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut modules: Vec<&String> = self.modules.keys().collect();
        modules.sort();
        f.debug_struct("StaticModuleValidator")
            .field("modules", &modules)
            .field("rejections", &self.rejections.len())
            .finish()
    }
}

/// Export the registration symbols for a mod library.
///
/// ```ignore
/// #[derive(Default)]
/// struct MyMod;
/// impl modhost_core::Mod for MyMod { /* ... */ }
///
/// modhost_core::declare_mod!(MyMod);
/// ```
#[macro_export]
macro_rules! declare_mod {
    ($($entry:ty),+ $(,)?) => {
        #[doc(hidden)]
        #[unsafe(no_mangle)]
        pub extern "Rust" fn _modhost_api_version() -> &'static str {
            $crate::kernel::constants::API_VERSION
        }

        #[doc(hidden)]
        #[unsafe(no_mangle)]
        pub extern "Rust" fn _modhost_register(registrar: &mut $crate::mod_system::compat::ModuleRegistrar) {
            $( registrar.register_default::<$entry>(stringify!($entry)); )+
        }
    };
}
