mod cli;
mod logging;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use modhost_core::kernel::constants::APP_NAME;
use modhost_core::mod_system::{ModHandle, ModMetadata, Stage};
use modhost_core::update::UpdateReport;
use modhost_core::{Error, HostSettings, LoadSummary, ModContext, ModSystemError, Result, StagedLoader, UpdateChecker, WebApiClient};
use tracing::{debug, info, warn};

use crate::cli::{CliArgs, Commands, GlobalArgs};

/// Default settings file, looked up next to the mods folder
const SETTINGS_FILE_NAME: &str = "modhost.json";

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    if let Err(e) = logging::init(args.global.verbose, args.global.json_logs) {
        eprintln!("Failed to initialize logging: {e}");
    }

    match run(args).await {
        Ok(code) => code,
        Err(e) if e.is_aborted() => {
            eprintln!("{}", ModSystemError::Aborted);
            ExitCode::from(130)
        }
        Err(e) => {
            eprintln!("{APP_NAME}: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: CliArgs) -> Result<ExitCode> {
    let context = Arc::new(build_context(&args.global)?);
    debug!("Mods folder: {}", context.mods_root().display());

    match args.command {
        Commands::Load {
            no_updates,
            run_commands,
        } => load(context, no_updates, &run_commands).await,
        Commands::List => list(&context),
        Commands::Check => check(&context),
    }
}

fn build_context(global: &GlobalArgs) -> Result<ModContext> {
    let default_settings = settings_path(&global.mods_path);
    let settings = HostSettings::load(Some(default_settings.as_path()), global.config.as_deref())?;
    Ok(ModContext::builder(&global.mods_path).settings(settings).build())
}

fn settings_path(mods_root: &Path) -> PathBuf {
    mods_root
        .parent()
        .map(|parent| parent.join(SETTINGS_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(SETTINGS_FILE_NAME))
}

fn join_error(e: tokio::task::JoinError) -> Error {
    Error::Other(format!("loader task failed: {e}"))
}

async fn load(context: Arc<ModContext>, no_updates: bool, run_commands: &[String]) -> Result<ExitCode> {
    let cancellation = context.cancellation().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received.");
            cancellation.cancel();
        }
    });

    let preload_context = context.clone();
    let mods = tokio::task::spawn_blocking(move || -> std::result::Result<Vec<ModHandle>, ModSystemError> {
        let loader = StagedLoader::new(preload_context);
        let mods = loader.preload(loader.resolve()?)?;
        loader.summarize(Stage::Preload, &mods, Vec::new());
        Ok(mods)
    })
    .await
    .map_err(join_error)??;

    let update_check = if no_updates {
        None
    } else {
        start_update_check(&context, &mods)
    };

    let load_context = context.clone();
    let loaded = mods.clone();
    let summary = tokio::task::spawn_blocking(move || -> std::result::Result<LoadSummary, ModSystemError> {
        let loader = StagedLoader::new(load_context);
        let runtime_errors = loader.load(&loaded)?;
        Ok(loader.summarize(Stage::Load, &loaded, runtime_errors))
    })
    .await
    .map_err(join_error)??;
    print!("{summary}");

    for line in run_commands {
        info!("Running command '{line}'");
        if let Err(e) = context.commands().trigger_line(line) {
            warn!("{e}");
        }
    }

    if let Some(task) = update_check {
        match task.await {
            Ok(report) => print_updates(&report),
            Err(e) => warn!("Update check task failed: {e}"),
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn start_update_check(context: &ModContext, mods: &[ModHandle]) -> Option<tokio::task::JoinHandle<UpdateReport>> {
    let settings = context.settings();
    if !settings.check_for_updates {
        return None;
    }
    match WebApiClient::new(settings.web_api_base_url.clone()) {
        Ok(client) => {
            let checker = Arc::new(UpdateChecker::new(Arc::new(client), settings.clone()));
            Some(checker.spawn(mods.to_vec()))
        }
        Err(e) => {
            warn!("Couldn't check for updates: {e}");
            None
        }
    }
}

fn print_updates(report: &UpdateReport) {
    if let Some(host) = &report.host {
        println!("{} {} is available (installed {}).", host.name, host.suggested, host.installed);
    }
    for update in &report.mods {
        println!(
            "Update available: {} {} -> {}{}",
            update.name,
            update.installed,
            update.suggested,
            update.url.as_deref().map(|u| format!(" ({u})")).unwrap_or_default()
        );
    }
}

fn list(context: &Arc<ModContext>) -> Result<ExitCode> {
    let resolved = StagedLoader::new(context.clone()).resolve()?;
    for (index, metadata) in resolved.iter().enumerate() {
        println!("{:>3}. {}", index + 1, describe(metadata));
    }
    Ok(ExitCode::SUCCESS)
}

fn describe(metadata: &ModMetadata) -> String {
    let version = metadata
        .manifest()
        .map(|m| format!(" {}", m.version))
        .unwrap_or_default();
    match metadata.failure() {
        Some(failure) => format!(
            "{}{version} [{}] because {}",
            metadata.display_name(),
            metadata.status(),
            failure.reason
        ),
        None if metadata.is_content_bundle() => format!("{}{version} (content bundle)", metadata.display_name()),
        None => format!("{}{version}", metadata.display_name()),
    }
}

fn check(context: &Arc<ModContext>) -> Result<ExitCode> {
    let resolved = StagedLoader::new(context.clone()).resolve()?;
    let handles: Vec<ModHandle> = resolved.into_iter().map(ModMetadata::into_handle).collect();
    let summary = LoadSummary::collect(Stage::Preload, &handles, context.settings());
    print!("{summary}");
    if summary.has_failures() {
        println!("{} mod(s) would be skipped.", summary.skipped_count());
        Ok(ExitCode::FAILURE)
    } else {
        println!("All {} mod(s) are valid.", handles.len());
        Ok(ExitCode::SUCCESS)
    }
}
