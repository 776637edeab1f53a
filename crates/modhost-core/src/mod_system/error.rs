//! # Modhost Mod System Errors
//!
//! The error taxonomy of the loading pipeline.
//!
//! Every per-mod variant renders as the reason phrase shown to users, in
//! the form "<mod> was skipped because <reason>". The loader converts these
//! into a failed [`ModMetadata`](super::metadata::ModMetadata) status and
//! never lets them escape; only [`ModSystemError::RootUnreadable`],
//! [`ModSystemError::Registry`] and [`ModSystemError::Aborted`] are fatal.
use std::path::PathBuf;

use thiserror::Error;

use crate::proxy::ProxyError;

/// Category of a per-mod failure, used to group reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FailureKind {
    Manifest,
    Validation,
    Dependency,
    Binary,
    Runtime,
    Proxy,
}

#[derive(Debug, Error)]
pub enum ModSystemError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Dependency(#[from] DependencyError),

    #[error(transparent)]
    Binary(#[from] BinaryError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Proxy(#[from] ProxyError),

    #[error("registry invariant violated: {0}")]
    Registry(#[from] RegistryError),

    /// The mods root itself could not be read
    #[error("can't read the mods folder '{path}': {source}")]
    RootUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Startup was cancelled externally
    #[error("shutting down: aborting initialization.")]
    Aborted,
}

impl ModSystemError {
    /// Failure category when this error is attributable to a single mod.
    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            ModSystemError::Manifest(_) => Some(FailureKind::Manifest),
            ModSystemError::Validation(_) => Some(FailureKind::Validation),
            ModSystemError::Dependency(_) => Some(FailureKind::Dependency),
            ModSystemError::Binary(_) => Some(FailureKind::Binary),
            ModSystemError::Runtime(_) => Some(FailureKind::Runtime),
            ModSystemError::Proxy(_) => Some(FailureKind::Proxy),
            ModSystemError::Registry(_) | ModSystemError::RootUnreadable { .. } | ModSystemError::Aborted => None,
        }
    }

    /// Whether a dependency or owner is at fault rather than the mod itself.
    /// A cycle is the mod's own problem.
    pub fn blames_dependency(&self) -> bool {
        matches!(self, ModSystemError::Dependency(error) if !matches!(error, DependencyError::Cycle { .. }))
    }
}

/// Malformed or missing manifest.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManifestError {
    #[error("it doesn't have a manifest.")]
    Missing,

    #[error("it's an empty folder.")]
    EmptyFolder,

    #[error("its manifest is invalid.")]
    Unparsable,

    #[error("its folder couldn't be read.")]
    UnreadableFolder,

    #[error("its manifest doesn't set the required '{0}' field.")]
    MissingField(&'static str),

    #[error("its manifest specifies an invalid version '{value}' for '{field}'.")]
    InvalidVersion { field: &'static str, value: String },

    #[error("its manifest specifies both an entry point and a content bundle owner, which isn't allowed.")]
    BothEntryAndOwner,

    #[error("its manifest has no entry point and isn't a content bundle.")]
    NoEntryOrOwner,

    #[error("its manifest entry point '{0}' must be a relative path inside the mod folder.")]
    UnsafeEntryPoint(String),

    #[error("its manifest unique ID '{0}' contains invalid characters (only letters, digits, '.', '-' and '_' are allowed).")]
    InvalidUniqueId(String),
}

/// Manifest-level problems found when comparing mods against each other
/// and against the host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("you have multiple copies of this mod installed. To fix this, delete these folders and reinstall the mod: {}.", .folders.join(", "))]
    DuplicateId { folders: Vec<String> },

    #[error("it needs a newer mod API version (needs {required}, host provides {host}). Please update the host.")]
    ApiTooOld { required: String, host: String },

    #[error("its manifest lists itself as a dependency.")]
    SelfDependency,
}

/// Missing, failed or circular required dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DependencyError {
    #[error("it requires mods which aren't installed ({}).", .ids.join(", "))]
    Missing { ids: Vec<String> },

    #[error("it needs the '{name}' mod, which couldn't be loaded.")]
    Failed { name: String },

    #[error("it needs a newer version of '{name}' ({minimum} or later, found {installed}).")]
    VersionTooLow {
        name: String,
        minimum: String,
        installed: String,
    },

    #[error("its dependencies have a circular reference: {}.", .cycle.join(" => "))]
    Cycle { cycle: Vec<String> },

    #[error("it's a content bundle for '{owner}', which couldn't be loaded.")]
    OwnerNotLoaded { owner: String },
}

/// Problems with a code mod's binary or its entry registration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BinaryError {
    #[error("{}", incompatible_message(.url))]
    Incompatible { url: Option<String> },

    #[error("its library couldn't be loaded.")]
    LoadFailed,

    #[error("its entry file uses an unsupported legacy packaging ({0}).")]
    LegacyPackaging(String),

    #[error("its library has no mod entry point.")]
    NoEntry,

    #[error("its library contains multiple mod entry points ({}).", .names.join(", "))]
    MultipleEntries { names: Vec<String> },

    #[error("its entry type couldn't be instantiated.")]
    InstantiationFailed,
}

fn incompatible_message(url: &Option<String>) -> String {
    match url {
        Some(url) => format!("it's no longer compatible. Please check for a new version at {url}"),
        None => "it's no longer compatible. Please check for a new version.".to_string(),
    }
}

/// Failures raised by mod code at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("it crashed on entry: {0}")]
    EntryFailed(String),

    #[error("its API accessor failed: {0}")]
    ApiFailed(String),

    #[error("a host hook failed for it: {0}")]
    HookFailed(String),
}

/// Registry misuse. These indicate a logic error in the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("a mod with ID '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("can't access content bundles before mod loading finishes")]
    NotReady,

    #[error("can't access mod APIs before all mods are initialized")]
    NotInitialized,

    #[error("the '{0}' readiness flag was already set")]
    FlagAlreadySet(&'static str),

    #[error("mod '{0}' has no unique ID")]
    MissingId(String),
}
