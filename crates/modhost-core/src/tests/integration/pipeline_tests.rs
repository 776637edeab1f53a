#![cfg(test)]

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;
use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::context::ModContext;
use crate::mod_system::metadata::ModStatus;
use crate::mod_system::StagedLoader;
use crate::storage::config::HostSettings;
use crate::tests::integration::common::{install_mods, validator};
use crate::update::{UpdateChecker, WebApiClient};

fn settings(root: &std::path::Path, api_url: &str) -> HostSettings {
    HostSettings {
        web_api_base_url: api_url.to_string(),
        data_path: Some(root.join("data")),
        ..HostSettings::default()
    }
}

#[tokio::test]
async fn test_end_to_end_load_commands_and_updates() {
    let dir = tempdir().unwrap();
    let mods_root = dir.path().join("Mods");
    install_mods(&mods_root);

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/mods"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "calc.core": { "suggestedVersion": "1.5.0", "url": "https://mods.example/100" },
            "CALC.UI": { "suggestedVersion": "1.0.0" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let results = Arc::new(Mutex::new(Vec::new()));
    let settings = settings(dir.path(), &server.uri());
    let context = Arc::new(
        ModContext::builder(&mods_root)
            .settings(settings)
            .validator(Arc::new(validator(&results)))
            .build(),
    );
    let loader = StagedLoader::new(context.clone());

    // Same sequence a host runs: preload, start the update check, load
    let mods = loader.preload(loader.resolve().unwrap()).unwrap();
    let client = Arc::new(WebApiClient::new(context.settings().web_api_base_url.clone()).unwrap());
    let checker = Arc::new(UpdateChecker::new(client, context.settings().clone()));
    let update_task = checker.spawn(mods.clone());
    let runtime_errors = loader.load(&mods).unwrap();
    assert!(runtime_errors.is_empty());

    let status = |id: &str| {
        mods.iter()
            .find(|h| h.read().has_id(id))
            .map(|h| h.read().status())
            .unwrap()
    };
    assert_eq!(status("Calc.Core"), ModStatus::Loaded);
    assert_eq!(status("Calc.Ui"), ModStatus::Loaded);
    assert_eq!(status("Calc.Skins"), ModStatus::Loaded);
    assert_eq!(status("Old.Thing"), ModStatus::Failed);

    // The UI mod saw its content bundle and saved global data
    assert_eq!(*results.lock(), vec!["skin:dark"]);
    assert!(dir.path().join("data/Calc.Ui/last-session.json").exists());

    // Commands run after initialization can reach other mods' APIs
    context.commands().trigger_line("double 21").unwrap();
    assert_eq!(results.lock().last().map(String::as_str), Some("Calculator Core:42"));

    let report = update_task.await.unwrap();
    assert_eq!(report.mods.len(), 1);
    assert_eq!(report.mods[0].name, "Calculator Core");
    assert_eq!(report.mods[0].suggested, "1.5.0");
    let summary = loader.summarize(crate::mod_system::summary::Stage::Load, &mods, runtime_errors);
    assert_eq!(summary.code_mods.len(), 2);
    assert_eq!(summary.content_bundles.len(), 1);
    assert_eq!(summary.skipped_for_own_reason.len(), 0);
    assert_eq!(summary.skipped_for_dependency.len(), 1);
    assert_eq!(
        summary.skipped_for_dependency[0].reason,
        "it requires mods which aren't installed (Long.Gone)."
    );
}

#[test]
fn test_run_reports_both_stages() {
    let dir = tempdir().unwrap();
    let mods_root = dir.path().join("Mods");
    install_mods(&mods_root);
    let results = Arc::new(Mutex::new(Vec::new()));
    let context = Arc::new(
        ModContext::builder(&mods_root)
            .settings(HostSettings {
                check_for_updates: false,
                ..settings(dir.path(), "http://127.0.0.1:9")
            })
            .validator(Arc::new(validator(&results)))
            .build(),
    );

    let report = StagedLoader::new(context.clone()).run().unwrap();
    assert_eq!(report.mods.len(), 4);
    assert_eq!(report.preload.code_mods.len(), 2);
    assert_eq!(report.preload.content_bundles.len(), 1);
    assert_eq!(report.load.code_mods.len(), 2);
    assert!(report.preload.has_failures());
    assert!(context.registry().is_all_initialized());
    assert!(context.commands().contains("DOUBLE"));
}
