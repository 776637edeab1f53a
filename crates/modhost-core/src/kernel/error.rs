//! # Modhost Kernel Errors
//!
//! Defines the top-level [`Error`] enum. Each subsystem keeps its own typed
//! error and converts into this one with `#[from]`, so host code can use a
//! single [`Result`] alias across the pipeline, storage and update layers.
use std::path::PathBuf;
use std::result::Result as StdResult;

use thiserror::Error as ThisError;

use crate::mod_system::error::ModSystemError;
use crate::mod_system::helpers::CommandError;
use crate::proxy::ProxyError;
use crate::storage::error::StorageSystemError;
use crate::update::UpdateError;

/// Top-level error for the modhost library
#[derive(Debug, ThisError)]
pub enum Error {
    /// Specific, typed mod system error
    #[error("Mod system error: {0}")]
    ModSystem(#[from] ModSystemError),

    /// Structural proxy generation or invocation failed
    #[error("Proxy error: {0}")]
    Proxy(#[from] ProxyError),

    /// Specific, typed storage system error
    #[error("Storage system error: {0}")]
    StorageSystem(#[from] StorageSystemError),

    /// Command registration or dispatch failed
    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    /// Update check failure
    #[error("Update check error: {0}")]
    Update(#[from] UpdateError),

    /// Generic error with message
    #[error("Error: {0}")]
    Other(String),
}

/// Shorthand for Result with our Error type
pub type Result<T> = StdResult<T, Error>;

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl Error {
    /// Wrap an I/O failure with the operation and path it happened on.
    pub fn io(source: std::io::Error, operation: impl Into<String>, path: PathBuf) -> Self {
        Error::StorageSystem(StorageSystemError::io(source, operation, path))
    }

    /// Whether this error means startup was cancelled rather than broken.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Error::ModSystem(ModSystemError::Aborted))
    }
}
