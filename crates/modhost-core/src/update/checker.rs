use std::collections::HashMap;
use std::sync::Arc;

use log::{info, trace, warn};
use tokio::task::JoinHandle;

use crate::kernel::constants::{API_VERSION, APP_NAME, APP_VERSION, HOST_UPDATE_ID};
use crate::mod_system::metadata::{ModHandle, UpdateInfo};
use crate::mod_system::version::parse_lenient;
use crate::storage::config::HostSettings;
use crate::update::client::UpdateClient;
use crate::update::model::{ModEntryResult, ModSearchEntry, UpdateCheckRequest};

/// A newer version the server suggested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailableUpdate {
    pub name: String,
    pub installed: String,
    pub suggested: String,
    pub url: Option<String>,
}

/// What a finished check found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateReport {
    pub host: Option<AvailableUpdate>,
    pub mods: Vec<AvailableUpdate>,
    /// Number of mods sent to the server, excluding the host
    pub checked: usize,
}

fn is_newer(suggested: &str, installed: &str) -> bool {
    match (parse_lenient(suggested), parse_lenient(installed)) {
        (Some(suggested), Some(installed)) => suggested > installed,
        _ => false,
    }
}

/// Checks every eligible mod for updates in one batch, off the load path.
///
/// Failures only produce warnings. Results are written into each mod's
/// metadata once and never change its status.
pub struct UpdateChecker {
    client: Arc<dyn UpdateClient>,
    settings: Arc<HostSettings>,
}

impl UpdateChecker {
    pub fn new(client: Arc<dyn UpdateClient>, settings: Arc<HostSettings>) -> Self {
        Self { client, settings }
    }

    /// Eligible mods as (lower-cased ID, handle). Mods without a usable ID
    /// or suppressed in settings are left out.
    fn eligible(&self, mods: &[ModHandle]) -> Vec<(String, ModHandle)> {
        mods.iter()
            .filter_map(|handle| {
                let id = handle.read().unique_id()?.trim().to_string();
                if id.is_empty() || self.settings.is_update_check_suppressed(&id) {
                    return None;
                }
                Some((id.to_lowercase(), handle.clone()))
            })
            .collect()
    }

    /// The batched request: the host first, then every eligible mod.
    pub fn build_request(&self, mods: &[ModHandle]) -> UpdateCheckRequest {
        let mut entries = vec![ModSearchEntry {
            id: HOST_UPDATE_ID.to_string(),
            installed_version: APP_VERSION.to_string(),
            update_keys: Vec::new(),
            is_broken: false,
        }];
        for (_, handle) in self.eligible(mods) {
            let metadata = handle.read();
            if let Some(manifest) = metadata.manifest() {
                entries.push(ModSearchEntry {
                    id: manifest.unique_id.clone(),
                    installed_version: manifest.version.to_string(),
                    update_keys: manifest.update_keys.clone(),
                    is_broken: metadata.is_failed(),
                });
            }
        }
        UpdateCheckRequest {
            api_version: API_VERSION.to_string(),
            platform: std::env::consts::OS.to_string(),
            mods: entries,
        }
    }

    /// Run the check and record the results.
    pub async fn check(&self, mods: &[ModHandle]) -> UpdateReport {
        if !self.settings.check_for_updates {
            trace!("Update checks are disabled.");
            return UpdateReport::default();
        }

        let request = self.build_request(mods);
        let checked = request.mods.len() - 1;
        trace!("Checking for updates to {APP_NAME} and {checked} mod(s)...");
        let results: HashMap<String, ModEntryResult> = match self.client.check(&request).await {
            Ok(response) => response.into_iter().map(|(id, result)| (id.to_lowercase(), result)).collect(),
            Err(e) => {
                warn!("Couldn't check for updates: {e}");
                return UpdateReport::default();
            }
        };

        let mut report = UpdateReport {
            checked,
            ..UpdateReport::default()
        };

        if let Some(result) = results.get(HOST_UPDATE_ID) {
            if let Some(suggested) = result.suggested_version.as_deref().filter(|v| is_newer(v, APP_VERSION)) {
                info!(
                    "You can update {APP_NAME} to {suggested}: {}",
                    result.url.as_deref().unwrap_or("(no URL)")
                );
                report.host = Some(AvailableUpdate {
                    name: APP_NAME.to_string(),
                    installed: APP_VERSION.to_string(),
                    suggested: suggested.to_string(),
                    url: result.url.clone(),
                });
            }
        }

        for (id, handle) in self.eligible(mods) {
            let Some(result) = results.get(&id) else {
                continue;
            };
            let mut metadata = handle.write();
            let name = metadata.display_name().to_string();
            for error in &result.errors {
                trace!("   {name}: {error}");
            }
            let installed = metadata
                .manifest()
                .map(|m| m.version.to_string())
                .unwrap_or_default();
            metadata.set_update_info(UpdateInfo {
                suggested_version: result.suggested_version.clone(),
                url: result.url.clone(),
                errors: result.errors.clone(),
            });
            if let Some(suggested) = result.suggested_version.as_deref().filter(|v| is_newer(v, &installed)) {
                report.mods.push(AvailableUpdate {
                    name,
                    installed,
                    suggested: suggested.to_string(),
                    url: result.url.clone(),
                });
            }
        }

        if !report.mods.is_empty() {
            report.mods.sort_by_key(|u| u.name.to_lowercase());
            info!("You can update {} mods:", report.mods.len());
            for update in &report.mods {
                info!(
                    "   {} {}: {}",
                    update.name,
                    update.suggested,
                    update.url.as_deref().unwrap_or("(no URL)")
                );
            }
        }
        report
    }

    /// Run [`check`](Self::check) on a background task.
    pub fn spawn(self: Arc<Self>, mods: Vec<ModHandle>) -> JoinHandle<UpdateReport> {
        tokio::spawn(async move { self.check(&mods).await })
    }
}

impl std::fmt::Debug for UpdateChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateChecker")
            .field("check_for_updates", &self.settings.check_for_updates)
            .finish_non_exhaustive()
    }
}
