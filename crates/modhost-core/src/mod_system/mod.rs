//! # Modhost Mod System
//!
//! Discovers mods, orders them by dependency and loads them in two stages.
//!
//! ## Flow
//! 1. [`resolver`] reads every `manifest.json` under the mods root,
//!    validates the manifests against each other and the host, and sorts
//!    them so required dependencies come first.
//! 2. [`loader::StagedLoader`] runs the preload and load stages over that
//!    order, recording each mod's outcome in its [`ModMetadata`].
//! 3. [`registry::ModRegistry`] tracks registered mods and the
//!    `AllLoaded` / `AllInitialized` readiness flags.
//! 4. [`summary::LoadSummary`] groups the outcome of each stage for display.
//!
//! Mod code reaches the host only through [`traits::Mod`] and the
//! [`helpers::ModHelper`] it is handed on entry.
pub mod compat;
pub mod error;
pub mod helpers;
pub mod loader;
pub mod manifest;
pub mod metadata;
pub mod registry;
pub mod resolver;
pub mod summary;
pub mod traits;
pub mod version;

pub use compat::{
    BinaryRejection, BinaryValidator, DylibValidator, EntryFactory, IncompatibilityReport, LoadedModule, ModuleId,
    ModuleRegistrar, StaticModuleValidator,
};
pub use error::{FailureKind, ModSystemError};
pub use helpers::ModHelper;
pub use loader::{LoadReport, StagedLoader};
pub use manifest::{Manifest, ManifestBuilder, ManifestDependency};
pub use metadata::{ModFailure, ModHandle, ModMetadata, ModStatus, ModWarning, UpdateInfo};
pub use registry::{ModFilter, ModRegistry};
pub use summary::{LoadSummary, Stage};
pub use traits::{HostHooks, Mod, ModResult, NoopHostHooks};

#[cfg(test)]
mod tests;
