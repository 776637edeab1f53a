//! # Mod Helpers
//!
//! The capability surface handed to each mod's entry callback. Every
//! helper is scoped to one mod: its logger is labelled with the mod's
//! name, its data lives under its own folder, and the commands it adds
//! are attributed to it.
//!
//! ## Submodules
//! - **[`monitor`]**: scoped logging ([`Monitor`], [`LogSink`]).
//! - **[`data`]**: persistent JSON data ([`DataHelper`]).
//! - **[`commands`]**: console commands ([`CommandManager`], [`CommandHelper`]).
//! - **[`registry_helper`]**: lookup of other mods, their APIs, and reflection.
//! - **[`content_packs`]**: content bundles owned by the mod.
//! - **[`translation`]**: locale-aware text lookup.
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::mod_system::manifest::Manifest;

pub mod commands;
pub mod content_packs;
pub mod data;
pub mod monitor;
pub mod registry_helper;
pub mod translation;

pub use commands::{Command, CommandCallback, CommandError, CommandHelper, CommandManager};
pub use content_packs::{ContentPack, ContentPackHelper};
pub use data::DataHelper;
pub use monitor::{LogCrateSink, LogSink, Monitor};
pub use registry_helper::{ModInfo, ReflectionHelper, RegistryHelper};
pub use translation::{TranslationHelper, TranslationMap};

/// Everything the host provides to one mod.
#[derive(Debug)]
pub struct ModHelper {
    manifest: Arc<Manifest>,
    directory: PathBuf,
    monitor: Monitor,
    data: DataHelper,
    commands: CommandHelper,
    registry: RegistryHelper,
    reflection: ReflectionHelper,
    content_packs: ContentPackHelper,
    translation: TranslationHelper,
}

impl ModHelper {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        manifest: Arc<Manifest>,
        directory: impl Into<PathBuf>,
        monitor: Monitor,
        data: DataHelper,
        commands: CommandHelper,
        registry: RegistryHelper,
        reflection: ReflectionHelper,
        content_packs: ContentPackHelper,
        translation: TranslationHelper,
    ) -> Self {
        Self {
            manifest,
            directory: directory.into(),
            monitor,
            data,
            commands,
            registry,
            reflection,
            content_packs,
            translation,
        }
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn mod_id(&self) -> &str {
        &self.manifest.unique_id
    }

    /// The mod's own folder
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    pub fn data(&self) -> &DataHelper {
        &self.data
    }

    pub fn commands(&self) -> &CommandHelper {
        &self.commands
    }

    pub fn registry(&self) -> &RegistryHelper {
        &self.registry
    }

    pub fn reflection(&self) -> &ReflectionHelper {
        &self.reflection
    }

    pub fn content_packs(&self) -> &ContentPackHelper {
        &self.content_packs
    }

    pub fn translation(&self) -> &TranslationHelper {
        &self.translation
    }
}
