#![cfg(test)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Value as Json, json};

use crate::context::ModContext;
use crate::mod_system::compat::StaticModuleValidator;
use crate::mod_system::helpers::ModHelper;
use crate::mod_system::manifest::{Manifest, ManifestBuilder};
use crate::mod_system::metadata::ModMetadata;
use crate::mod_system::traits::{Mod, ModResult};
use crate::proxy::ApiObject;
use crate::storage::config::HostSettings;

/// Shared, ordered record of what test mods did
pub type EventLog = Arc<Mutex<Vec<String>>>;

pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// How a [`ScriptedMod`] behaves on entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Succeed,
    Fail,
    Panic,
}

pub struct ScriptedMod {
    pub name: String,
    pub log: EventLog,
    pub behavior: Behavior,
    pub api: Option<ApiObject>,
}

impl Mod for ScriptedMod {
    fn entry(&mut self, helper: Arc<ModHelper>) -> ModResult<()> {
        self.log.lock().push(format!("entry:{}", self.name));
        helper.monitor().trace("entered");
        match self.behavior {
            Behavior::Succeed => Ok(()),
            Behavior::Fail => Err("entry refused".into()),
            Behavior::Panic => panic!("entry exploded"),
        }
    }

    fn api(&self) -> ModResult<Option<ApiObject>> {
        Ok(self.api.clone())
    }
}

/// Serve a [`ScriptedMod`] for the entry file `<id>.dll`.
pub fn with_scripted(
    validator: StaticModuleValidator,
    id: &str,
    log: &EventLog,
    behavior: Behavior,
    api: Option<ApiObject>,
) -> StaticModuleValidator {
    let name = id.to_string();
    let log = log.clone();
    validator.with_module(&format!("{id}.dll"), move |registrar| {
        let name = name.clone();
        let log = log.clone();
        let api = api.clone();
        registrar.register(name.clone(), move || {
            Box::new(ScriptedMod {
                name: name.clone(),
                log: log.clone(),
                behavior,
                api: api.clone(),
            }) as Box<dyn Mod>
        });
    })
}

pub fn code_manifest(id: &str, dependencies: &[&str]) -> Json {
    json!({
        "UniqueID": id,
        "Name": id,
        "Version": "1.0.0",
        "EntryPoint": format!("{id}.dll"),
        "UpdateKeys": [format!("Test:{id}")],
        "Dependencies": dependencies.iter().map(|d| json!({ "UniqueID": d })).collect::<Vec<_>>(),
    })
}

pub fn bundle_manifest(id: &str, owner: &str) -> Json {
    json!({
        "UniqueID": id,
        "Name": id,
        "Version": "1.0.0",
        "ContentBundleForID": owner,
        "UpdateKeys": [format!("Test:{id}")],
    })
}

/// Create `<root>/<folder>/manifest.json`.
pub fn write_mod(root: &Path, folder: &str, manifest: &Json) -> PathBuf {
    let dir = root.join(folder);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("manifest.json"), serde_json::to_string_pretty(manifest).unwrap()).unwrap();
    dir
}

pub fn quiet_settings(data_path: &Path) -> HostSettings {
    HostSettings {
        check_for_updates: false,
        data_path: Some(data_path.to_path_buf()),
        ..HostSettings::default()
    }
}

pub fn context(root: &Path, validator: StaticModuleValidator) -> Arc<ModContext> {
    let data_path = root.join(".data");
    Arc::new(
        ModContext::builder(root)
            .validator(Arc::new(validator))
            .settings(quiet_settings(&data_path))
            .build(),
    )
}

/// In-memory manifest for a code mod whose display name equals its ID.
pub fn code(id: &str) -> ManifestBuilder {
    ManifestBuilder::code(id, id, format!("{id}.dll"))
}

pub fn metadata(manifest: Manifest) -> ModMetadata {
    let folder = manifest.unique_id.clone();
    ModMetadata::new(PathBuf::from("/mods").join(&folder), folder, manifest)
}
