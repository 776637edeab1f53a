use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn write_mod(root: &Path, folder: &str, manifest: &str) {
    let dir = root.join(folder);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("manifest.json"), manifest).unwrap();
}

fn code_mod(root: &Path, id: &str, dependencies: &[&str]) {
    let dependencies: Vec<String> = dependencies
        .iter()
        .map(|d| format!(r#"{{ "UniqueID": "{d}" }}"#))
        .collect();
    write_mod(
        root,
        id,
        &format!(
            r#"{{
                "UniqueID": "{id}",
                "Name": "{id}",
                "Version": "1.0.0",
                "EntryPoint": "{id}.{ext}",
                "UpdateKeys": ["Nexus:1"],
                "Dependencies": [{deps}]
            }}"#,
            ext = std::env::consts::DLL_EXTENSION,
            deps = dependencies.join(", ")
        ),
    );
}

fn modhost() -> Command {
    let mut cmd = Command::cargo_bin("modhost").unwrap();
    cmd.env_remove("MODHOST_MODS_PATH").env_remove("MODHOST_CONFIG");
    cmd
}

#[test]
fn test_help_lists_subcommands() -> Result<(), Box<dyn std::error::Error>> {
    modhost()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("load"))
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("check"));
    Ok(())
}

#[test]
fn test_list_prints_dependency_order() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    code_mod(dir.path(), "Alpha", &["Zeta"]);
    code_mod(dir.path(), "Zeta", &[]);

    modhost()
        .arg("list")
        .arg("--mods-path")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"(?s)1\. Zeta 1\.0\.0.*2\. Alpha 1\.0\.0")?);
    Ok(())
}

#[test]
fn test_check_fails_on_missing_dependency() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    code_mod(dir.path(), "Needy", &["Ghost"]);
    code_mod(dir.path(), "Fine", &[]);

    modhost()
        .arg("check")
        .env("MODHOST_MODS_PATH", dir.path())
        .assert()
        .failure()
        .stdout(predicate::str::contains(
            "Needy because it requires mods which aren't installed (Ghost).",
        ))
        .stdout(predicate::str::contains("1 mod(s) would be skipped."));
    Ok(())
}

#[test]
fn test_check_passes_clean_folder() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    code_mod(dir.path(), "One", &[]);
    code_mod(dir.path(), "Two", &["One"]);

    modhost()
        .args(["check", "--mods-path"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("All 2 mod(s) are valid."));
    Ok(())
}

#[test]
fn test_load_reports_skipped_mods() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let mods = dir.path().join("Mods");
    code_mod(&mods, "Engine", &[]);
    write_mod(
        &mods,
        "Engine Skins",
        r#"{ "UniqueID": "Engine.Skins", "Name": "Engine Skins", "Version": "1.0.0", "ContentBundleForID": "Engine" }"#,
    );
    let config = dir.path().join("custom.json");
    fs::write(&config, r#"{ "check_for_updates": false, "locale": "fr" }"#)?;

    modhost()
        .args(["load", "--run-command", "missing-command"])
        .arg("--mods-path")
        .arg(&mods)
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Skipped mods"))
        .stdout(predicate::str::contains("Engine because its library couldn't be loaded."))
        .stdout(predicate::str::contains(
            "Engine Skins because it's a content bundle for 'Engine', which couldn't be loaded.",
        ));
    Ok(())
}

#[test]
fn test_unreadable_mods_folder_fails() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    modhost()
        .args(["load", "--no-updates", "--mods-path"])
        .arg(dir.path().join("does-not-exist"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("can't read the mods folder"));
    Ok(())
}

#[test]
fn test_invalid_settings_file_fails() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let config = dir.path().join("settings.ini");
    fs::write(&config, "check_for_updates = no")?;
    modhost()
        .args(["list", "--mods-path"])
        .arg(dir.path())
        .arg("--config")
        .arg(&config)
        .assert()
        .failure();
    Ok(())
}
