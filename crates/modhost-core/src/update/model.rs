//! Wire types of the update-check web API.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One batched update-check request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCheckRequest {
    pub api_version: String,
    pub platform: String,
    pub mods: Vec<ModSearchEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModSearchEntry {
    pub id: String,
    pub installed_version: String,
    pub update_keys: Vec<String>,
    /// Whether the installed copy failed to load
    pub is_broken: bool,
}

/// Result for one mod.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModEntryResult {
    #[serde(default)]
    pub suggested_version: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Results keyed by mod ID, as sent by the server.
pub type UpdateCheckResponse = HashMap<String, ModEntryResult>;
