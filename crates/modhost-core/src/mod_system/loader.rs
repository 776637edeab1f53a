//! # Staged Loader
//!
//! Drives mods through the two load stages, in the order the resolver
//! produced:
//!
//! 1. **Preload** registers content bundles and probes code mods without
//!    running any mod code.
//! 2. **Load** validates and instantiates code mods, settles content
//!    bundles, sets `AllLoaded`, then runs every entry callback, fetches
//!    APIs, wires host interceptors and finally sets `AllInitialized`.
//!
//! A failure attributable to one mod marks that mod and moves on. Only
//! cancellation and registry invariant violations stop a stage.
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, error, info, trace, warn};

use crate::context::ModContext;
use crate::mod_system::compat::LoadedModule;
use crate::mod_system::error::{BinaryError, DependencyError, ModSystemError, RuntimeError};
use crate::mod_system::helpers::{
    CommandHelper, ContentPackHelper, DataHelper, ModHelper, Monitor, ReflectionHelper, RegistryHelper,
    TranslationHelper,
};
use crate::mod_system::manifest::Manifest;
use crate::mod_system::metadata::{ModHandle, ModMetadata, ModWarning};
use crate::mod_system::resolver::{process_dependencies, read_manifests, validate_manifests};
use crate::mod_system::summary::{LoadSummary, Stage};
use crate::mod_system::traits::{Mod, ModResult};
use crate::proxy::object::panic_message;

/// Every discovered mod plus the summary of each stage.
#[derive(Debug)]
pub struct LoadReport {
    pub mods: Vec<ModHandle>,
    pub preload: LoadSummary,
    pub load: LoadSummary,
}

/// A code mod instantiated in the main loop, waiting for its entry call.
struct PendingEntry {
    handle: ModHandle,
    instance: Box<dyn Mod>,
    helper: Arc<ModHelper>,
}

/// Run mod code, turning both errors and panics into a message.
fn isolate<T>(call: impl FnOnce() -> ModResult<T>) -> Result<T, String> {
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.to_string()),
        Err(payload) => Err(format!("panicked: {}", panic_message(payload.as_ref()))),
    }
}

pub struct StagedLoader {
    context: Arc<ModContext>,
}

impl StagedLoader {
    pub fn new(context: Arc<ModContext>) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &Arc<ModContext> {
        &self.context
    }

    /// Discover, validate and order the mods under the context's root.
    pub fn resolve(&self) -> Result<Vec<ModMetadata>, ModSystemError> {
        let mut mods = read_manifests(self.context.mods_root())?;
        validate_manifests(&mut mods, self.context.host_api_version());
        Ok(process_dependencies(mods))
    }

    /// Resolve, run both stages and log a summary after each.
    pub fn run(&self) -> Result<LoadReport, ModSystemError> {
        let resolved = self.resolve()?;
        let mods = self.preload(resolved)?;
        let preload = self.summarize(Stage::Preload, &mods, Vec::new());
        let runtime_errors = self.load(&mods)?;
        let load = self.summarize(Stage::Load, &mods, runtime_errors);
        Ok(LoadReport { mods, preload, load })
    }

    /// Build and log the summary for a finished stage.
    pub fn summarize(&self, stage: Stage, mods: &[ModHandle], runtime_errors: Vec<(String, String)>) -> LoadSummary {
        let summary = LoadSummary::collect(stage, mods, self.context.settings()).with_runtime_errors(runtime_errors);
        summary.log();
        summary
    }

    fn check_cancelled(&self) -> Result<(), ModSystemError> {
        if self.context.is_cancelled() {
            warn!("{}", ModSystemError::Aborted);
            return Err(ModSystemError::Aborted);
        }
        Ok(())
    }

    /// Register content bundles and probe code mods, in resolved order.
    ///
    /// Returns a handle for every mod, including those already failed.
    pub fn preload(&self, mods: Vec<ModMetadata>) -> Result<Vec<ModHandle>, ModSystemError> {
        let handles: Vec<ModHandle> = mods.into_iter().map(ModMetadata::into_handle).collect();
        let registry = self.context.registry();
        let settings = self.context.settings();
        trace!("Preloading {} mod(s)...", handles.len());

        for handle in &handles {
            self.check_cancelled()?;

            let manifest = {
                let metadata = handle.read();
                if metadata.is_failed() {
                    trace!(
                        "   {} skipped: {}",
                        metadata.display_name(),
                        metadata.failure().map(|f| f.reason.as_str()).unwrap_or_default()
                    );
                    continue;
                }
                match metadata.manifest() {
                    Some(manifest) => manifest.clone(),
                    None => continue,
                }
            };
            trace!("   {} {}...", manifest.name, manifest.version);

            if let Some(name) = self.unregistered_dependency(handle, &manifest, &handles) {
                handle.write().fail(DependencyError::Failed { name }, None);
                continue;
            }

            if manifest.update_keys.is_empty() && !settings.is_update_check_suppressed(&manifest.unique_id) {
                handle.write().add_warning(ModWarning::NoUpdateKeys);
            }

            if !manifest.is_content_bundle() {
                let entry_path = self.entry_path(handle, &manifest);
                if let Err(error) = self.context.validator().probe(&entry_path) {
                    handle.write().fail(error, Some(entry_path.display().to_string()));
                    continue;
                }
            }
            registry.add(handle.clone())?;
        }

        debug!("Preload registered {} mod(s)", registry.len());
        Ok(handles)
    }

    /// Load and initialize the mods that survived preload.
    ///
    /// Returns the entry, API and hook failures of mods that stayed loaded,
    /// as `(mod name, message)`.
    pub fn load(&self, mods: &[ModHandle]) -> Result<Vec<(String, String)>, ModSystemError> {
        let registry = self.context.registry();
        let mut pending = Vec::new();
        trace!("Loading {} mod(s)...", registry.len());

        for handle in mods {
            self.check_cancelled()?;
            let manifest = {
                let metadata = handle.read();
                if metadata.is_failed() {
                    continue;
                }
                match metadata.manifest() {
                    Some(manifest) => manifest.clone(),
                    None => continue,
                }
            };
            // Owners are ordered ahead of their bundles, so the owner's
            // outcome is already settled here.
            if manifest.is_content_bundle() {
                self.settle_content_bundle(handle, &manifest, mods);
            } else if let Some(entry) = self.load_code_mod(handle, &manifest, mods) {
                pending.push(entry);
            }
        }

        registry.mark_all_loaded()?;
        debug!("All mods loaded; running entry points.");
        self.initialize(pending)
    }

    fn load_code_mod(&self, handle: &ModHandle, manifest: &Arc<Manifest>, all: &[ModHandle]) -> Option<PendingEntry> {
        let registry = self.context.registry();
        trace!("   {} {}...", manifest.name, manifest.version);

        if let Some(name) = self.unregistered_dependency(handle, manifest, all) {
            self.fail_and_remove(handle, manifest, DependencyError::Failed { name }.into(), None);
            return None;
        }

        let entry_path = self.entry_path(handle, manifest);
        let module = match self.context.validator().validate(&entry_path) {
            Ok(module) => module,
            Err(rejection) => {
                let (error, detail) = rejection.into_error();
                self.fail_and_remove(handle, manifest, error.into(), detail);
                return None;
            }
        };
        {
            let mut metadata = handle.write();
            for warning in &module.warnings {
                metadata.add_warning(*warning);
            }
        }

        let instance = match self.instantiate(&module) {
            Ok(instance) => instance,
            Err((error, detail)) => {
                self.fail_and_remove(handle, manifest, error.into(), detail);
                return None;
            }
        };

        registry.track_module(module.id.clone(), &manifest.unique_id);
        let directory = handle.read().directory().to_path_buf();
        let helper = Arc::new(self.build_helper(manifest, &directory));
        {
            let mut metadata = handle.write();
            metadata.set_module(Arc::new(module));
            metadata.mark_loaded();
        }

        Some(PendingEntry {
            handle: handle.clone(),
            instance,
            helper,
        })
    }

    /// Create the module's single entry instance.
    fn instantiate(&self, module: &LoadedModule) -> Result<Box<dyn Mod>, (BinaryError, Option<String>)> {
        let factory = match module.entries.as_slice() {
            [factory] => factory,
            [] => return Err((BinaryError::NoEntry, Some(module.id.to_string()))),
            _ => {
                return Err((
                    BinaryError::MultipleEntries {
                        names: module.entry_names(),
                    },
                    Some(module.id.to_string()),
                ));
            }
        };
        panic::catch_unwind(AssertUnwindSafe(|| factory.instantiate())).map_err(|payload| {
            (
                BinaryError::InstantiationFailed,
                Some(format!("{}: {}", factory.name(), panic_message(payload.as_ref()))),
            )
        })
    }

    /// Keep a bundle whose owner loaded; skip it otherwise.
    fn settle_content_bundle(&self, handle: &ModHandle, manifest: &Manifest, mods: &[ModHandle]) {
        let registry = self.context.registry();
        if let Some(name) = self.unregistered_dependency(handle, manifest, mods) {
            self.fail_and_remove(handle, manifest, DependencyError::Failed { name }.into(), None);
            return;
        }
        let owner = manifest.content_bundle_for.as_deref().unwrap_or_default();
        if registry.is_loaded(owner) {
            handle.write().mark_loaded();
        } else {
            let owner = self.display_name_of(owner, mods, handle);
            handle.write().skip(DependencyError::OwnerNotLoaded { owner }, None);
            registry.remove(&manifest.unique_id);
            trace!("   {} skipped: its owner didn't load", manifest.name);
        }
    }

    /// Everything after `AllLoaded`: translations, entries, APIs and
    /// interceptors, then `AllInitialized`.
    fn initialize(&self, pending: Vec<PendingEntry>) -> Result<Vec<(String, String)>, ModSystemError> {
        let hooks = self.context.hooks();
        let mut runtime_errors = Vec::new();

        for entry in &pending {
            let result = {
                let metadata = entry.handle.read();
                isolate(|| hooks.load_translations(&metadata))
            };
            match result {
                Ok(translations) => entry.helper.translation().set_translations(translations),
                Err(message) => self.report(&entry.handle, RuntimeError::HookFailed(message), &mut runtime_errors),
            }
        }

        let mut initialized = Vec::with_capacity(pending.len());
        for PendingEntry {
            handle,
            mut instance,
            helper,
        } in pending
        {
            if let Err(message) = isolate(|| instance.entry(helper.clone())) {
                self.report(&handle, RuntimeError::EntryFailed(message), &mut runtime_errors);
            }

            let instance: Arc<dyn Mod> = Arc::from(instance);
            match isolate(|| instance.api()) {
                Ok(Some(api)) => handle.write().set_api(api),
                Ok(None) => {}
                Err(message) => self.report(&handle, RuntimeError::ApiFailed(message), &mut runtime_errors),
            }
            handle.write().set_entry(instance.clone());
            initialized.push((handle, instance));
        }

        for (handle, instance) in &initialized {
            let result = {
                let metadata = handle.read();
                isolate(|| hooks.wire_interceptors(&metadata, instance))
            };
            if let Err(message) = result {
                self.report(handle, RuntimeError::HookFailed(message), &mut runtime_errors);
            }
        }

        self.context.registry().mark_all_initialized()?;
        info!("Mods initialized: {} code mod(s) ready.", initialized.len());
        Ok(runtime_errors)
    }

    /// Log a runtime failure against the mod that owns the failing code.
    fn report(&self, handle: &ModHandle, error: RuntimeError, errors: &mut Vec<(String, String)>) {
        let module = handle.read().module().map(|m| m.id.clone());
        let owner = module
            .and_then(|id| self.context.registry().owner_of_module(&id))
            .unwrap_or_else(|| handle.clone());
        let name = owner.read().display_name().to_string();
        error!("{name} failed: {error}");
        errors.push((name, error.to_string()));
    }

    fn fail_and_remove(&self, handle: &ModHandle, manifest: &Manifest, error: ModSystemError, detail: Option<String>) {
        handle.write().fail(error, detail);
        self.context.registry().remove(&manifest.unique_id);
        trace!("   {} failed and was removed from the registry", manifest.name);
    }

    fn entry_path(&self, handle: &ModHandle, manifest: &Manifest) -> PathBuf {
        let directory = handle.read().directory().to_path_buf();
        directory.join(manifest.entry_point.as_deref().unwrap_or_default())
    }

    /// Display name of the first required dependency that isn't registered.
    fn unregistered_dependency(&self, handle: &ModHandle, manifest: &Manifest, all: &[ModHandle]) -> Option<String> {
        let registry = self.context.registry();
        manifest
            .dependencies
            .iter()
            .filter(|d| d.is_required)
            .find(|d| !registry.contains(&d.unique_id))
            .map(|d| self.display_name_of(&d.unique_id, all, handle))
    }

    fn display_name_of(&self, id: &str, all: &[ModHandle], exclude: &ModHandle) -> String {
        all.iter()
            .filter(|h| !Arc::ptr_eq(*h, exclude))
            .find_map(|h| {
                let metadata = h.read();
                metadata.has_id(id).then(|| metadata.display_name().to_string())
            })
            .unwrap_or_else(|| id.to_string())
    }

    fn build_helper(&self, manifest: &Arc<Manifest>, directory: &Path) -> ModHelper {
        let context = &self.context;
        let id = &manifest.unique_id;
        ModHelper::new(
            manifest.clone(),
            directory,
            Monitor::new(
                manifest.name.clone(),
                context.log_sink().clone(),
                context.settings().is_verbose(id),
            ),
            DataHelper::new(directory, context.data_path().join(id)),
            CommandHelper::new(manifest.name.clone(), context.commands().clone()),
            RegistryHelper::new(context.registry().clone(), context.proxies().clone()),
            ReflectionHelper::new(context.registry().clone(), context.proxies().clone()),
            ContentPackHelper::new(id.clone(), context.registry().clone()),
            TranslationHelper::new(context.settings().locale.clone()),
        )
    }
}
