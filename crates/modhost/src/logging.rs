use std::error::Error;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Install the global subscriber and route `log` records into it.
///
/// Logs go to stderr so command output on stdout stays clean.
pub fn init(verbose: bool, json: bool) -> Result<(), Box<dyn Error + Send + Sync>> {
    let default_level = if verbose { "trace" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        let layer = fmt::layer().json().with_writer(std::io::stderr);
        tracing::subscriber::set_global_default(registry.with(layer))?;
    } else {
        let layer = fmt::layer().with_target(verbose).with_writer(std::io::stderr);
        tracing::subscriber::set_global_default(registry.with(layer))?;
    }
    tracing_log::LogTracer::init()?;
    Ok(())
}
