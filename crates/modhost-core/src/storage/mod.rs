//! # Modhost Storage
//!
//! File-system plumbing shared by the loader and the mod capability surface.
//!
//! - **[`local`]**: [`LocalStorage`], a store rooted at one directory with
//!   path-escape checks and atomic JSON writes. Each mod's data helper and
//!   content-pack reader sits on one of these.
//! - **[`config`]**: [`HostSettings`] and the layered default/user settings
//!   loader supporting JSON, YAML and TOML.
//! - **[`error`]**: [`StorageSystemError`].
pub mod config;
pub mod error;
pub mod local;

pub use config::{ConfigFormat, HostSettings};
pub use error::StorageSystemError;
pub use local::LocalStorage;
