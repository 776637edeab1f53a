use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;
use parking_lot::RwLock;

use crate::mod_system::compat::LoadedModule;
use crate::mod_system::error::{FailureKind, ModSystemError};
use crate::mod_system::manifest::Manifest;
use crate::mod_system::traits::Mod;
use crate::proxy::ApiObject;

/// Shared, lockable handle to one mod's metadata.
pub type ModHandle = Arc<RwLock<ModMetadata>>;

/// Load status. Moves forward from `Pending` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModStatus {
    Pending,
    Loaded,
    Failed,
    Skipped,
}

impl ModStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ModStatus::Pending)
    }
}

impl fmt::Display for ModStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ModStatus::Pending => "pending",
            ModStatus::Loaded => "loaded",
            ModStatus::Failed => "failed",
            ModStatus::Skipped => "skipped",
        };
        f.write_str(label)
    }
}

/// Non-fatal issues worth telling the user about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ModWarning {
    /// Loaded despite code the compatibility layer knows is broken
    BrokenCodeLoaded,
    /// Replaces the host's save serializer
    ChangesSaveSerializer,
    /// Rewrites or patches host code
    EditsHostCode,
    /// Hooks host events without the host's safety checks
    UnvalidatedHookUsage,
    /// Declares no update keys, so update checks can't find it
    NoUpdateKeys,
}

impl ModWarning {
    pub const ALL: [ModWarning; 5] = [
        ModWarning::BrokenCodeLoaded,
        ModWarning::ChangesSaveSerializer,
        ModWarning::EditsHostCode,
        ModWarning::UnvalidatedHookUsage,
        ModWarning::NoUpdateKeys,
    ];

    /// Heading used when grouping mods by warning.
    pub fn heading(self) -> &'static str {
        match self {
            ModWarning::BrokenCodeLoaded => "Broken mods",
            ModWarning::ChangesSaveSerializer => "Changed save serializer",
            ModWarning::EditsHostCode => "Edits host code",
            ModWarning::UnvalidatedHookUsage => "Bypassed safety checks",
            ModWarning::NoUpdateKeys => "No update keys",
        }
    }

    /// Whether this warning is only shown with paranoid warnings enabled.
    pub fn is_paranoid(self) -> bool {
        matches!(self, ModWarning::UnvalidatedHookUsage)
    }
}

/// Why a mod didn't load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModFailure {
    pub kind: FailureKind,
    /// User-facing phrase, completing "skipped because ..."
    pub reason: String,
    /// Technical detail for developers
    pub detail: Option<String>,
    /// Set when a dependency or owner failed rather than the mod itself
    pub blames_dependency: bool,
}

/// Informational result of an update check.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UpdateInfo {
    pub suggested_version: Option<String>,
    pub url: Option<String>,
    pub errors: Vec<String>,
}

/// Runtime state of one discovered mod folder.
pub struct ModMetadata {
    directory: PathBuf,
    relative_directory: String,
    manifest: Option<Arc<Manifest>>,
    status: ModStatus,
    failure: Option<ModFailure>,
    warnings: BTreeSet<ModWarning>,
    // Field order matters: the entry instance and API must drop before the
    // library that contains their code.
    entry: Option<Arc<dyn Mod>>,
    api: Option<ApiObject>,
    module: Option<Arc<LoadedModule>>,
    update: Option<UpdateInfo>,
}

impl ModMetadata {
    pub fn new(directory: impl Into<PathBuf>, relative_directory: impl Into<String>, manifest: Manifest) -> Self {
        Self {
            directory: directory.into(),
            relative_directory: relative_directory.into(),
            manifest: Some(Arc::new(manifest)),
            status: ModStatus::Pending,
            failure: None,
            warnings: BTreeSet::new(),
            entry: None,
            api: None,
            module: None,
            update: None,
        }
    }

    /// Metadata for a folder whose manifest couldn't be read.
    pub fn without_manifest(
        directory: impl Into<PathBuf>,
        relative_directory: impl Into<String>,
        error: impl Into<ModSystemError>,
        detail: Option<String>,
    ) -> Self {
        let mut metadata = Self {
            directory: directory.into(),
            relative_directory: relative_directory.into(),
            manifest: None,
            status: ModStatus::Pending,
            failure: None,
            warnings: BTreeSet::new(),
            entry: None,
            api: None,
            module: None,
            update: None,
        };
        metadata.fail(error, detail);
        metadata
    }

    /// Manifest name, or the folder path when the manifest is unreadable.
    pub fn display_name(&self) -> &str {
        match &self.manifest {
            Some(manifest) => &manifest.name,
            None => &self.relative_directory,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Folder path relative to the mods root
    pub fn relative_directory(&self) -> &str {
        &self.relative_directory
    }

    pub fn manifest(&self) -> Option<&Arc<Manifest>> {
        self.manifest.as_ref()
    }

    pub fn unique_id(&self) -> Option<&str> {
        self.manifest.as_ref().map(|m| m.unique_id.as_str())
    }

    pub fn has_id(&self, id: &str) -> bool {
        self.manifest.as_ref().is_some_and(|m| m.has_id(id))
    }

    pub fn is_content_bundle(&self) -> bool {
        self.manifest.as_ref().is_some_and(|m| m.is_content_bundle())
    }

    pub fn status(&self) -> ModStatus {
        self.status
    }

    pub fn failure(&self) -> Option<&ModFailure> {
        self.failure.as_ref()
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, ModStatus::Failed | ModStatus::Skipped)
    }

    /// Move from `Pending` to `Loaded`. Returns false if already terminal.
    pub fn mark_loaded(&mut self) -> bool {
        self.transition(ModStatus::Loaded)
    }

    /// Record a failure. The first failure wins; later ones are ignored.
    pub fn fail(&mut self, error: impl Into<ModSystemError>, detail: Option<String>) -> bool {
        self.record(ModStatus::Failed, error.into(), detail)
    }

    /// Like [`fail`](Self::fail) but with `Skipped` status.
    pub fn skip(&mut self, error: impl Into<ModSystemError>, detail: Option<String>) -> bool {
        self.record(ModStatus::Skipped, error.into(), detail)
    }

    fn record(&mut self, status: ModStatus, error: ModSystemError, detail: Option<String>) -> bool {
        if !self.transition(status) {
            debug!(
                "Ignoring later failure for {} ({}): {}",
                self.display_name(),
                self.status,
                error
            );
            return false;
        }
        self.failure = Some(ModFailure {
            kind: error.kind().unwrap_or(FailureKind::Runtime),
            reason: error.to_string(),
            detail,
            blames_dependency: error.blames_dependency(),
        });
        true
    }

    fn transition(&mut self, to: ModStatus) -> bool {
        if self.status.is_terminal() || to == ModStatus::Pending {
            return false;
        }
        self.status = to;
        true
    }

    pub fn warnings(&self) -> &BTreeSet<ModWarning> {
        &self.warnings
    }

    pub fn has_warning(&self, warning: ModWarning) -> bool {
        self.warnings.contains(&warning)
    }

    pub fn add_warning(&mut self, warning: ModWarning) {
        self.warnings.insert(warning);
    }

    pub fn entry(&self) -> Option<&Arc<dyn Mod>> {
        self.entry.as_ref()
    }

    pub fn set_entry(&mut self, entry: Arc<dyn Mod>) {
        self.entry = Some(entry);
    }

    pub fn api(&self) -> Option<&ApiObject> {
        self.api.as_ref()
    }

    pub fn set_api(&mut self, api: ApiObject) {
        self.api = Some(api);
    }

    pub fn module(&self) -> Option<&Arc<LoadedModule>> {
        self.module.as_ref()
    }

    pub fn set_module(&mut self, module: Arc<LoadedModule>) {
        self.module = Some(module);
    }

    /// Update-check result, absent until the check completes.
    pub fn update_info(&self) -> Option<&UpdateInfo> {
        self.update.as_ref()
    }

    /// Store an update-check result. Only the first write is kept.
    pub fn set_update_info(&mut self, info: UpdateInfo) -> bool {
        if self.update.is_some() {
            return false;
        }
        self.update = Some(info);
        true
    }

    pub fn into_handle(self) -> ModHandle {
        Arc::new(RwLock::new(self))
    }
}

impl fmt::Debug for ModMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModMetadata")
            .field("display_name", &self.display_name())
            .field("unique_id", &self.unique_id())
            .field("directory", &self.directory)
            .field("status", &self.status)
            .field("failure", &self.failure)
            .field("warnings", &self.warnings)
            .field("has_entry", &self.entry.is_some())
            .field("has_api", &self.api.is_some())
            .finish()
    }
}
