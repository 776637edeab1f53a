#![cfg(test)]

use std::fs;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Value as Json, json};

use crate::mod_system::compat::{ModuleRegistrar, StaticModuleValidator};
use crate::mod_system::helpers::ModHelper;
use crate::mod_system::traits::{Mod, ModResult};
use crate::proxy::{ApiObject, ApiTable};

crate::define_interface! {
    /// What the UI mod expects from the calculator core
    pub trait Calculator as CalculatorProxy {
        fn double(x: i64) -> i64;
        fn label() -> String;
    }
}

pub type Results = Arc<Mutex<Vec<String>>>;

/// A mods folder laid out the way players install them: one folder per
/// mod, some inside a group folder.
pub fn install_mods(root: &Path) {
    write(root, "Calc Core", json!({
        "UniqueID": "Calc.Core",
        "Name": "Calculator Core",
        "Version": "1.0.0",
        "Author": "Ada",
        "EntryPoint": "CalcCore.dll",
        "UpdateKeys": ["Nexus:100"]
    }));
    write(root, "UI/Calc UI", json!({
        "UniqueID": "Calc.Ui",
        "Name": "Calculator UI",
        "Version": "1.0.0",
        "EntryPoint": "CalcUi.dll",
        "UpdateKeys": ["Nexus:101"],
        "Dependencies": [
            { "UniqueID": "Calc.Core", "MinimumVersion": "1.0" },
            { "UniqueID": "Calc.Themes", "IsRequired": false }
        ]
    }));
    write(root, "UI/[CP] Calc Skins", json!({
        "UniqueID": "Calc.Skins",
        "Name": "Calculator Skins",
        "Version": "1.0.0",
        "ContentBundleForID": "Calc.Ui",
        "UpdateKeys": ["Nexus:102"]
    }));
    let skins = root.join("UI/[CP] Calc Skins");
    fs::write(skins.join("skins.json"), r#"{"default": "dark"}"#).unwrap();
    write(root, "Legacy", json!({
        "UniqueID": "Old.Thing",
        "Name": "Old Thing",
        "Version": "0.1.0",
        "EntryPoint": "OldThing.dll",
        "Dependencies": [{ "UniqueID": "Long.Gone" }]
    }));
}

fn write(root: &Path, folder: &str, manifest: Json) {
    let dir = root.join(folder);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("manifest.json"), manifest.to_string()).unwrap();
}

struct CalcCore;

impl Mod for CalcCore {
    fn entry(&mut self, helper: Arc<ModHelper>) -> ModResult<()> {
        helper.monitor().info("calculator ready");
        Ok(())
    }

    fn api(&self) -> ModResult<Option<ApiObject>> {
        Ok(Some(
            ApiTable::new("calc_core::Api")
                .method("double", |x: i64| x * 2)
                .method("label", || "Calculator Core".to_string())
                .build(),
        ))
    }
}

/// Adds a `double` console command that goes through the core's API.
struct CalcUi {
    results: Results,
}

impl Mod for CalcUi {
    fn entry(&mut self, helper: Arc<ModHelper>) -> ModResult<()> {
        for pack in helper.content_packs().owned()? {
            let skins: Option<Json> = pack.read_json("skins.json")?;
            let skin = skins.and_then(|s| s["default"].as_str().map(str::to_string)).unwrap_or_default();
            self.results.lock().push(format!("skin:{skin}"));
        }
        helper.data().write_global("last-session", &json!({ "launched": true }))?;

        let results = self.results.clone();
        let captured = helper.clone();
        helper.commands().add("double", "Doubles a number using the core API.", move |_, args| {
            let value: i64 = args.first().and_then(|a| a.parse().ok()).unwrap_or_default();
            let output = match captured.registry().get_api::<CalculatorProxy>("calc.core") {
                Ok(Some(calc)) => match (calc.label(), calc.double(value)) {
                    (Ok(label), Ok(doubled)) => format!("{label}:{doubled}"),
                    (Err(e), _) | (_, Err(e)) => format!("error:{e}"),
                },
                Ok(None) => "no api".to_string(),
                Err(e) => format!("error:{e}"),
            };
            results.lock().push(output);
        })?;
        Ok(())
    }
}

pub fn validator(results: &Results) -> StaticModuleValidator {
    let results = results.clone();
    StaticModuleValidator::new()
        .with_module("CalcCore.dll", |registrar: &mut ModuleRegistrar| {
            registrar.register("CalcCore", || Box::new(CalcCore) as Box<dyn Mod>);
        })
        .with_module("CalcUi.dll", move |registrar: &mut ModuleRegistrar| {
            let results = results.clone();
            registrar.register("CalcUi", move || {
                Box::new(CalcUi {
                    results: results.clone(),
                }) as Box<dyn Mod>
            });
        })
}
