use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use modhost_core::kernel::constants::{CONFIG_PATH_ENV, DEFAULT_MODS_DIR, MODS_PATH_ENV};

/// Modhost: discovers, orders and loads mods
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Folder containing installed mods
    #[arg(long, global = true, env = MODS_PATH_ENV, default_value = DEFAULT_MODS_DIR)]
    pub mods_path: PathBuf,

    /// Settings file overriding the defaults
    #[arg(long, global = true, env = CONFIG_PATH_ENV)]
    pub config: Option<PathBuf>,

    /// Log everything at trace level (RUST_LOG still wins)
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full load pipeline
    Load {
        /// Skip the background update check
        #[arg(long)]
        no_updates: bool,

        /// Console command to trigger once mods are initialized; repeatable
        #[arg(long = "run-command", value_name = "COMMAND")]
        run_commands: Vec<String>,
    },
    /// Print the resolved load order without running any mod code
    List,
    /// Validate manifests and dependencies; fails if any mod would be skipped
    Check,
}
