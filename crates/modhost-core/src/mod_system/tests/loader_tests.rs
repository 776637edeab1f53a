#![cfg(test)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use tempfile::tempdir;

use crate::context::ModContext;
use crate::mod_system::compat::{BinaryRejection, IncompatibilityReport, ModuleRegistrar, StaticModuleValidator};
use crate::mod_system::error::{FailureKind, ModSystemError};
use crate::mod_system::helpers::{ModHelper, TranslationMap};
use crate::mod_system::loader::StagedLoader;
use crate::mod_system::metadata::{ModHandle, ModMetadata, ModStatus, ModWarning};
use crate::mod_system::registry::ModRegistry;
use crate::mod_system::traits::{HostHooks, Mod, ModResult};
use crate::mod_system::tests::common::{
    Behavior, EventLog, bundle_manifest, code_manifest, context, event_log, quiet_settings, with_scripted, write_mod,
};
use crate::proxy::ApiTable;

fn find(mods: &[ModHandle], id: &str) -> ModHandle {
    mods.iter().find(|h| h.read().has_id(id)).cloned().unwrap()
}

fn reason(mods: &[ModHandle], id: &str) -> String {
    find(mods, id).read().failure().map(|f| f.reason.clone()).unwrap_or_default()
}

#[test]
fn test_full_pipeline_loads_in_dependency_order() {
    let dir = tempdir().unwrap();
    write_mod(dir.path(), "Consumer", &code_manifest("Consumer", &["Provider"]));
    write_mod(dir.path(), "Provider", &code_manifest("Provider", &[]));

    let log = event_log();
    let api = ApiTable::new("Provider.Api").method("Answer", || 42i64).build();
    let validator = with_scripted(StaticModuleValidator::new(), "Provider", &log, Behavior::Succeed, Some(api));
    let validator = with_scripted(validator, "Consumer", &log, Behavior::Succeed, None);
    let ctx = context(dir.path(), validator);

    let report = StagedLoader::new(ctx.clone()).run().unwrap();

    assert_eq!(*log.lock(), vec!["entry:Provider", "entry:Consumer"]);
    assert!(report.mods.iter().all(|h| h.read().status() == ModStatus::Loaded));
    assert!(ctx.registry().is_all_loaded());
    assert!(ctx.registry().is_all_initialized());
    assert!(find(&report.mods, "Provider").read().api().is_some());
    assert!(find(&report.mods, "Consumer").read().entry().is_some());
    assert_eq!(report.load.code_mods.len(), 2);
    assert!(!report.load.has_failures());
}

#[test]
fn test_entry_failure_is_isolated() {
    let dir = tempdir().unwrap();
    write_mod(dir.path(), "Crasher", &code_manifest("Crasher", &[]));
    write_mod(dir.path(), "Refuser", &code_manifest("Refuser", &[]));
    write_mod(dir.path(), "Dependent", &code_manifest("Dependent", &["Crasher"]));
    write_mod(dir.path(), "Independent", &code_manifest("Independent", &[]));

    let log = event_log();
    let validator = with_scripted(StaticModuleValidator::new(), "Crasher", &log, Behavior::Panic, None);
    let validator = with_scripted(validator, "Refuser", &log, Behavior::Fail, None);
    let validator = with_scripted(validator, "Dependent", &log, Behavior::Succeed, None);
    let validator = with_scripted(validator, "Independent", &log, Behavior::Succeed, None);
    let ctx = context(dir.path(), validator);

    let report = StagedLoader::new(ctx.clone()).run().unwrap();

    // Entry failures leave the mod loaded, so dependents still load
    for id in ["Crasher", "Refuser", "Dependent", "Independent"] {
        assert_eq!(find(&report.mods, id).read().status(), ModStatus::Loaded, "{id}");
        assert!(ctx.registry().contains(id));
    }
    let log = log.lock();
    assert!(log.contains(&"entry:Independent".to_string()));
    assert!(log.contains(&"entry:Dependent".to_string()));

    let failed: Vec<&str> = report.load.runtime_errors.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(failed, vec!["Crasher", "Refuser"]);
    assert!(report.load.runtime_errors[0].1.contains("entry exploded"));
    assert!(report.load.runtime_errors[1].1.contains("entry refused"));
}

#[test]
fn test_binary_failures_remove_mod_and_fail_dependents() {
    let dir = tempdir().unwrap();
    write_mod(dir.path(), "NoEntry", &code_manifest("NoEntry", &[]));
    write_mod(dir.path(), "TwoEntries", &code_manifest("TwoEntries", &[]));
    write_mod(dir.path(), "Outdated", &code_manifest("Outdated", &[]));
    write_mod(dir.path(), "Corrupt", &code_manifest("Corrupt", &[]));
    write_mod(dir.path(), "NeedsOutdated", &code_manifest("NeedsOutdated", &["Outdated"]));

    let log = event_log();
    let validator = StaticModuleValidator::new()
        .with_module("noentry.dll", |_: &mut ModuleRegistrar| {})
        .with_module("twoentries.dll", |registrar: &mut ModuleRegistrar| {
            registrar.register_default::<Quiet>("First");
            registrar.register_default::<Quiet>("Second");
        })
        .with_rejection(
            "outdated.dll",
            BinaryRejection::Incompatible(IncompatibilityReport {
                message: "calls a removed host method".to_string(),
                remediation_url: Some("https://mods.example/outdated".to_string()),
            }),
        )
        .with_rejection("corrupt.dll", BinaryRejection::load_failed("bad image format"));
    let validator = with_scripted(validator, "NeedsOutdated", &log, Behavior::Succeed, None);
    let ctx = context(dir.path(), validator);

    let report = StagedLoader::new(ctx.clone()).run().unwrap();
    let mods = &report.mods;

    assert_eq!(reason(mods, "NoEntry"), "its library has no mod entry point.");
    assert_eq!(
        reason(mods, "TwoEntries"),
        "its library contains multiple mod entry points (First, Second)."
    );
    assert_eq!(
        reason(mods, "Outdated"),
        "it's no longer compatible. Please check for a new version at https://mods.example/outdated"
    );
    assert_eq!(
        find(mods, "Outdated").read().failure().unwrap().detail.as_deref(),
        Some("calls a removed host method")
    );
    assert_eq!(reason(mods, "Corrupt"), "its library couldn't be loaded.");
    assert_eq!(reason(mods, "NeedsOutdated"), "it needs the 'Outdated' mod, which couldn't be loaded.");

    for id in ["NoEntry", "TwoEntries", "Outdated", "Corrupt", "NeedsOutdated"] {
        assert_eq!(find(mods, id).read().status(), ModStatus::Failed, "{id}");
        assert!(!ctx.registry().contains(id), "{id} should be unregistered");
    }
    assert!(log.lock().is_empty());

    assert_eq!(report.load.skipped_for_dependency.len(), 1);
    assert_eq!(report.load.skipped_for_dependency[0].mods, vec!["NeedsOutdated"]);
    assert_eq!(report.load.skipped_for_own_reason.len(), 4);
}

#[derive(Default)]
struct Quiet;

impl Mod for Quiet {
    fn entry(&mut self, _helper: Arc<ModHelper>) -> ModResult<()> {
        Ok(())
    }
}

#[test]
fn test_instantiation_panic_is_a_binary_failure() {
    let dir = tempdir().unwrap();
    write_mod(dir.path(), "Fragile", &code_manifest("Fragile", &[]));
    let validator = StaticModuleValidator::new().with_module("fragile.dll", |registrar: &mut ModuleRegistrar| {
        registrar.register("Fragile", || -> Box<dyn Mod> { panic!("constructor failed") });
    });
    let ctx = context(dir.path(), validator);

    let report = StagedLoader::new(ctx).run().unwrap();
    let fragile = find(&report.mods, "Fragile");
    let metadata = fragile.read();
    let failure = metadata.failure().unwrap();
    assert_eq!(failure.kind, FailureKind::Binary);
    assert_eq!(failure.reason, "its entry type couldn't be instantiated.");
    assert!(failure.detail.as_deref().unwrap().contains("constructor failed"));
}

#[test]
fn test_content_bundles_follow_their_owner() {
    let dir = tempdir().unwrap();
    write_mod(dir.path(), "Owner", &code_manifest("Owner", &[]));
    write_mod(dir.path(), "Broken", &code_manifest("Broken", &[]));
    write_mod(dir.path(), "Hats", &bundle_manifest("Pack.Hats", "owner"));
    write_mod(dir.path(), "Orphan", &bundle_manifest("Pack.Orphan", "Broken"));
    write_mod(dir.path(), "Stray", &bundle_manifest("Pack.Stray", "Not.Installed"));

    // The owner lists its bundles during entry, after AllLoaded
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let seen_by_owner = seen.clone();
    let validator = StaticModuleValidator::new()
        .with_module("owner.dll", move |registrar: &mut ModuleRegistrar| {
            let seen = seen_by_owner.clone();
            registrar.register("Owner", move || -> Box<dyn Mod> {
                Box::new(PackReader { seen: seen.clone() })
            });
        })
        .with_rejection("broken.dll", BinaryRejection::load_failed("nope"));
    let ctx = context(dir.path(), validator);

    let report = StagedLoader::new(ctx.clone()).run().unwrap();
    let mods = &report.mods;

    assert_eq!(find(mods, "Pack.Hats").read().status(), ModStatus::Loaded);
    assert_eq!(*seen.lock(), vec!["Pack.Hats".to_string()]);

    for (id, owner) in [("Pack.Orphan", "Broken"), ("Pack.Stray", "Not.Installed")] {
        let handle = find(mods, id);
        let metadata = handle.read();
        assert_eq!(metadata.status(), ModStatus::Skipped, "{id}");
        let failure = metadata.failure().unwrap();
        assert_eq!(failure.kind, FailureKind::Dependency);
        assert_eq!(
            failure.reason,
            format!("it's a content bundle for '{owner}', which couldn't be loaded.")
        );
        assert!(!ctx.registry().contains(id));
    }
    assert_eq!(report.load.content_bundles.len(), 1);
    assert_eq!(report.load.content_bundles[0].owner.as_deref(), Some("Owner"));
}

#[test]
fn test_mods_requiring_a_skipped_bundle_fail() {
    let dir = tempdir().unwrap();
    write_mod(dir.path(), "Owner", &code_manifest("Owner", &[]));
    write_mod(dir.path(), "Pack", &bundle_manifest("Pack", "Owner"));
    write_mod(dir.path(), "User", &code_manifest("User", &["Pack"]));

    let log = event_log();
    let validator = StaticModuleValidator::new().with_rejection("owner.dll", BinaryRejection::load_failed("nope"));
    let validator = with_scripted(validator, "User", &log, Behavior::Succeed, None);
    let ctx = context(dir.path(), validator);

    let report = StagedLoader::new(ctx.clone()).run().unwrap();
    let mods = &report.mods;

    assert_eq!(find(mods, "Owner").read().status(), ModStatus::Failed);
    assert_eq!(find(mods, "Pack").read().status(), ModStatus::Skipped);
    assert_eq!(reason(mods, "Pack"), "it's a content bundle for 'Owner', which couldn't be loaded.");
    assert_eq!(find(mods, "User").read().status(), ModStatus::Failed);
    assert_eq!(reason(mods, "User"), "it needs the 'Pack' mod, which couldn't be loaded.");
    assert!(log.lock().is_empty());
    assert!(!ctx.registry().contains("User"));
    assert!(report.load.code_mods.is_empty());
}

struct PackReader {
    seen: Arc<parking_lot::Mutex<Vec<String>>>,
}

impl Mod for PackReader {
    fn entry(&mut self, helper: Arc<ModHelper>) -> ModResult<()> {
        for pack in helper.content_packs().owned()? {
            self.seen.lock().push(pack.manifest().unique_id.clone());
        }
        Ok(())
    }
}

#[test]
fn test_duplicates_are_never_registered() {
    let dir = tempdir().unwrap();
    write_mod(dir.path(), "One", &code_manifest("Twin", &[]));
    write_mod(dir.path(), "Two", &code_manifest("twin", &[]));
    let log = event_log();
    let validator = with_scripted(StaticModuleValidator::new(), "Twin", &log, Behavior::Succeed, None);
    let ctx = context(dir.path(), validator);

    let report = StagedLoader::new(ctx.clone()).run().unwrap();
    assert!(report.mods.iter().all(|h| h.read().status() == ModStatus::Failed));
    assert!(ctx.registry().is_empty());
    assert!(log.lock().is_empty());
}

#[test]
fn test_legacy_packaging_fails_in_preload() {
    let dir = tempdir().unwrap();
    write_mod(dir.path(), "Old", &serde_json::json!({
        "UniqueID": "Old", "Name": "Old", "Version": "1.0.0", "EntryPoint": "Old.zip"
    }));
    // Default validator loads dynamic libraries
    let ctx = Arc::new(
        ModContext::builder(dir.path())
            .settings(quiet_settings(&dir.path().join(".data")))
            .build(),
    );
    let loader = StagedLoader::new(ctx.clone());
    let mods = loader.preload(loader.resolve().unwrap()).unwrap();

    let old = find(&mods, "Old");
    assert_eq!(old.read().status(), ModStatus::Failed);
    assert_eq!(old.read().failure().unwrap().kind, FailureKind::Binary);
    assert!(ctx.registry().is_empty());
}

#[test]
fn test_cancellation_aborts_preload() {
    let dir = tempdir().unwrap();
    write_mod(dir.path(), "A", &code_manifest("A", &[]));
    let ctx = context(dir.path(), StaticModuleValidator::new());
    ctx.cancellation().cancel();

    let err = StagedLoader::new(ctx.clone()).run().unwrap_err();
    assert!(matches!(err, ModSystemError::Aborted));
    assert_eq!(err.to_string(), "shutting down: aborting initialization.");
    assert!(ctx.registry().is_empty());
}

#[test]
fn test_cancellation_between_stages_aborts_load() {
    let dir = tempdir().unwrap();
    write_mod(dir.path(), "A", &code_manifest("A", &[]));
    let log = event_log();
    let validator = with_scripted(StaticModuleValidator::new(), "A", &log, Behavior::Succeed, None);
    let ctx = context(dir.path(), validator);
    let loader = StagedLoader::new(ctx.clone());

    let mods = loader.preload(loader.resolve().unwrap()).unwrap();
    ctx.cancellation().cancel();
    assert!(matches!(loader.load(&mods), Err(ModSystemError::Aborted)));
    assert!(!ctx.registry().is_all_loaded());
    assert!(log.lock().is_empty());
}

/// Records readiness flags as seen from inside each phase.
struct ReadinessProbe {
    registry: Arc<OnceLock<Arc<ModRegistry>>>,
    events: EventLog,
}

impl HostHooks for ReadinessProbe {
    fn load_translations(&self, metadata: &ModMetadata) -> ModResult<TranslationMap> {
        let registry = self.registry.get().ok_or("registry not set")?;
        self.events.lock().push(format!(
            "translations:{}:{}",
            metadata.display_name(),
            registry.is_all_loaded()
        ));
        let mut map = TranslationMap::new();
        map.entry("default".to_string())
            .or_default()
            .insert("greeting".to_string(), "hello {{name}}".to_string());
        Ok(map)
    }

    fn wire_interceptors(&self, metadata: &ModMetadata, _entry: &Arc<dyn Mod>) -> ModResult<()> {
        let registry = self.registry.get().ok_or("registry not set")?;
        self.events.lock().push(format!(
            "interceptors:{}:{}",
            metadata.display_name(),
            registry.is_all_initialized()
        ));
        Ok(())
    }
}

struct Greeter {
    events: EventLog,
}

impl Mod for Greeter {
    fn entry(&mut self, helper: Arc<ModHelper>) -> ModResult<()> {
        let text = helper.translation().get_with("greeting", &[("name", "farmer")]).unwrap_or_default();
        // APIs aren't available until every entry has run
        let api_ready = helper.registry().get_api_object("Greeter").is_ok();
        self.events.lock().push(format!("entry:{text}:{api_ready}"));
        Ok(())
    }
}

#[test]
fn test_readiness_flags_and_phase_order() {
    let dir = tempdir().unwrap();
    write_mod(dir.path(), "Greeter", &code_manifest("Greeter", &[]));
    write_mod(dir.path(), "Pack", &bundle_manifest("Pack", "Greeter"));

    let registry_slot: Arc<OnceLock<Arc<ModRegistry>>> = Arc::new(OnceLock::new());
    let loaded_during_instantiation = Arc::new(AtomicBool::new(true));
    let events = event_log();

    let slot = registry_slot.clone();
    let flag = loaded_during_instantiation.clone();
    let entry_events = events.clone();
    let validator = StaticModuleValidator::new().with_module("greeter.dll", move |registrar: &mut ModuleRegistrar| {
        let slot = slot.clone();
        let flag = flag.clone();
        let events = entry_events.clone();
        registrar.register("Greeter", move || -> Box<dyn Mod> {
            let loaded = slot.get().is_some_and(|r| r.is_all_loaded());
            flag.store(loaded, Ordering::SeqCst);
            Box::new(Greeter { events: events.clone() })
        });
    });
    let hooks = ReadinessProbe {
        registry: registry_slot.clone(),
        events: events.clone(),
    };
    let ctx = Arc::new(
        ModContext::builder(dir.path())
            .validator(Arc::new(validator))
            .hooks(Arc::new(hooks))
            .settings(quiet_settings(&dir.path().join(".data")))
            .build(),
    );
    registry_slot.set(ctx.registry().clone()).ok();

    let loader = StagedLoader::new(ctx.clone());
    let mods = loader.preload(loader.resolve().unwrap()).unwrap();
    assert!(!ctx.registry().is_all_loaded());
    // Bundles can't be enumerated yet
    assert!(ctx.registry().content_bundles_for("Greeter").is_err());

    loader.load(&mods).unwrap();
    assert!(!loaded_during_instantiation.load(Ordering::SeqCst));
    assert_eq!(
        *events.lock(),
        vec![
            "translations:Greeter:true",
            "entry:hello farmer:false",
            "interceptors:Greeter:false",
        ]
    );
    assert!(ctx.registry().is_all_initialized());
    assert_eq!(ctx.registry().content_bundles_for("Greeter").unwrap().len(), 1);
}

#[test]
fn test_warnings_are_recorded() {
    let dir = tempdir().unwrap();
    write_mod(dir.path(), "Keyless", &serde_json::json!({
        "UniqueID": "Keyless", "Name": "Keyless", "Version": "1.0.0", "EntryPoint": "keyless.dll"
    }));
    let validator = StaticModuleValidator::new().with_module("keyless.dll", |registrar: &mut ModuleRegistrar| {
        registrar.register_default::<Quiet>("Quiet");
        registrar.warn(ModWarning::EditsHostCode);
    });
    let ctx = context(dir.path(), validator);

    let report = StagedLoader::new(ctx).run().unwrap();
    let keyless = find(&report.mods, "Keyless");
    assert!(keyless.read().has_warning(ModWarning::NoUpdateKeys));
    assert!(keyless.read().has_warning(ModWarning::EditsHostCode));
    assert_eq!(report.load.warnings.get(&ModWarning::EditsHostCode), Some(&vec!["Keyless".to_string()]));
}

#[test]
fn test_hook_failures_are_isolated() {
    struct FailingHooks;
    impl HostHooks for FailingHooks {
        fn wire_interceptors(&self, metadata: &ModMetadata, _entry: &Arc<dyn Mod>) -> ModResult<()> {
            if metadata.has_id("A") {
                panic!("interceptor crashed");
            }
            Ok(())
        }
    }

    let dir = tempdir().unwrap();
    write_mod(dir.path(), "A", &code_manifest("A", &[]));
    write_mod(dir.path(), "B", &code_manifest("B", &[]));
    let log = event_log();
    let validator = with_scripted(StaticModuleValidator::new(), "A", &log, Behavior::Succeed, None);
    let validator = with_scripted(validator, "B", &log, Behavior::Succeed, None);
    let data = dir.path().join(".data");
    let ctx = Arc::new(
        ModContext::builder(dir.path())
            .validator(Arc::new(validator))
            .hooks(Arc::new(FailingHooks))
            .settings(quiet_settings(&data))
            .build(),
    );

    let report = StagedLoader::new(ctx.clone()).run().unwrap();
    assert!(ctx.registry().is_all_initialized());
    assert!(report.mods.iter().all(|h| h.read().status() == ModStatus::Loaded));
    assert_eq!(report.load.runtime_errors.len(), 1);
    assert!(report.load.runtime_errors[0].1.contains("interceptor crashed"));
}
