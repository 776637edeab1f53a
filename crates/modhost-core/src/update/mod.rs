//! # Modhost Update Checker
//!
//! Asks the web API whether newer versions exist for the host and every
//! installed mod. Runs detached from the load pipeline; results are
//! informational and stored in [`UpdateInfo`](crate::mod_system::UpdateInfo).
//!
//! - **[`model`]**: request and response wire types.
//! - **[`client`]**: the [`UpdateClient`] seam and the HTTP [`WebApiClient`].
//! - **[`checker`]**: the batch [`UpdateChecker`].
pub mod checker;
pub mod client;
pub mod model;

pub use checker::{AvailableUpdate, UpdateChecker, UpdateReport};
pub use client::{UpdateClient, UpdateError, WebApiClient};
pub use model::{ModEntryResult, ModSearchEntry, UpdateCheckRequest, UpdateCheckResponse};

#[cfg(test)]
mod tests;
