//! Per-stage load reports.
use std::collections::BTreeMap;
use std::fmt;

use log::{info, warn};

use crate::mod_system::metadata::{ModHandle, ModWarning};
use crate::storage::config::HostSettings;

/// Pipeline stage a summary describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Preload,
    Load,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Preload => f.write_str("preload"),
            Stage::Load => f.write_str("load"),
        }
    }
}

/// A mod that is still in play after the stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModLine {
    pub name: String,
    pub version: String,
    pub author: Option<String>,
    pub description: Option<String>,
    /// Owner display name, for content bundles
    pub owner: Option<String>,
}

/// Mods that failed with the same reason and detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureGroup {
    pub reason: String,
    pub detail: Option<String>,
    pub mods: Vec<String>,
}

/// Outcome of one pipeline stage, grouped for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    pub stage: Stage,
    pub code_mods: Vec<ModLine>,
    pub content_bundles: Vec<ModLine>,
    /// Mods skipped because a dependency or owner couldn't load
    pub skipped_for_dependency: Vec<FailureGroup>,
    /// Mods skipped for their own reason
    pub skipped_for_own_reason: Vec<FailureGroup>,
    pub warnings: BTreeMap<ModWarning, Vec<String>>,
    /// (mod name, message) for entry, API and hook failures of loaded mods
    pub runtime_errors: Vec<(String, String)>,
}

impl LoadSummary {
    pub fn collect(stage: Stage, mods: &[ModHandle], settings: &HostSettings) -> Self {
        let mut code_mods = Vec::new();
        let mut content_bundles = Vec::new();
        let mut dependency_groups: Vec<FailureGroup> = Vec::new();
        let mut own_groups: Vec<FailureGroup> = Vec::new();
        let mut warnings: BTreeMap<ModWarning, Vec<String>> = BTreeMap::new();

        let owner_name = |owner_id: &str| -> String {
            mods.iter()
                .find_map(|h| {
                    let m = h.read_recursive();
                    m.has_id(owner_id).then(|| m.display_name().to_string())
                })
                .unwrap_or_else(|| owner_id.to_string())
        };

        for handle in mods {
            let metadata = handle.read();
            let name = metadata.display_name().to_string();

            if let Some(failure) = metadata.failure() {
                let groups = if failure.blames_dependency {
                    &mut dependency_groups
                } else {
                    &mut own_groups
                };
                match groups
                    .iter_mut()
                    .find(|g| g.reason == failure.reason && g.detail == failure.detail)
                {
                    Some(group) => group.mods.push(name),
                    None => groups.push(FailureGroup {
                        reason: failure.reason.clone(),
                        detail: failure.detail.clone(),
                        mods: vec![name],
                    }),
                }
                continue;
            }

            let Some(manifest) = metadata.manifest() else {
                continue;
            };
            let line = ModLine {
                name: name.clone(),
                version: manifest.version.to_string(),
                author: manifest.author.clone(),
                description: manifest.description.clone(),
                owner: manifest.content_bundle_for.as_deref().map(|id| owner_name(id)),
            };
            if manifest.is_content_bundle() {
                content_bundles.push(line);
            } else {
                code_mods.push(line);
            }

            for warning in metadata.warnings() {
                if warning.is_paranoid() && !settings.paranoid_warnings {
                    continue;
                }
                if *warning == ModWarning::NoUpdateKeys && settings.is_update_check_suppressed(&manifest.unique_id) {
                    continue;
                }
                warnings.entry(*warning).or_default().push(name.clone());
            }
        }

        code_mods.sort_by_key(|l| l.name.to_lowercase());
        content_bundles.sort_by_key(|l| l.name.to_lowercase());
        for group in dependency_groups.iter_mut().chain(own_groups.iter_mut()) {
            group.mods.sort_by_key(|n| n.to_lowercase());
        }
        for names in warnings.values_mut() {
            names.sort_by_key(|n| n.to_lowercase());
        }

        Self {
            stage,
            code_mods,
            content_bundles,
            skipped_for_dependency: dependency_groups,
            skipped_for_own_reason: own_groups,
            warnings,
            runtime_errors: Vec::new(),
        }
    }

    pub fn with_runtime_errors(mut self, errors: Vec<(String, String)>) -> Self {
        self.runtime_errors = errors;
        self
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped_for_dependency
            .iter()
            .chain(&self.skipped_for_own_reason)
            .map(|g| g.mods.len())
            .sum()
    }

    pub fn has_failures(&self) -> bool {
        self.skipped_count() > 0
    }

    /// Emit the summary through `log`, once.
    pub fn log(&self) {
        info!(
            "Finished {} stage: {} mod(s) and {} content bundle(s) in play, {} skipped.",
            self.stage,
            self.code_mods.len(),
            self.content_bundles.len(),
            self.skipped_count()
        );
        for line in self.to_string().lines() {
            if self.has_failures() || !self.warnings.is_empty() || !self.runtime_errors.is_empty() {
                warn!("{line}");
            } else {
                info!("{line}");
            }
        }
    }
}

fn write_mod_line(f: &mut fmt::Formatter<'_>, line: &ModLine) -> fmt::Result {
    write!(f, "   {} {}", line.name, line.version)?;
    if let Some(author) = &line.author {
        write!(f, " by {author}")?;
    }
    if let Some(owner) = &line.owner {
        write!(f, " | for {owner}")?;
    }
    if let Some(description) = &line.description {
        write!(f, " | {description}")?;
    }
    writeln!(f)
}

fn write_groups(f: &mut fmt::Formatter<'_>, groups: &[FailureGroup]) -> fmt::Result {
    for group in groups {
        for name in &group.mods {
            writeln!(f, "      - {name} because {}", group.reason)?;
        }
        if let Some(detail) = &group.detail {
            writeln!(f, "        ({detail})")?;
        }
    }
    Ok(())
}

impl fmt::Display for LoadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.code_mods.is_empty() {
            writeln!(f, "Loaded {} mods:", self.code_mods.len())?;
            for line in &self.code_mods {
                write_mod_line(f, line)?;
            }
        }
        if !self.content_bundles.is_empty() {
            writeln!(f, "Loaded {} content bundles:", self.content_bundles.len())?;
            for line in &self.content_bundles {
                write_mod_line(f, line)?;
            }
        }
        if self.has_failures() {
            writeln!(f, "Skipped mods")?;
            writeln!(f, "   These mods could not be added to your game.")?;
            write_groups(f, &self.skipped_for_own_reason)?;
            if !self.skipped_for_dependency.is_empty() {
                writeln!(f, "   These mods were skipped because a mod they need couldn't be loaded.")?;
                write_groups(f, &self.skipped_for_dependency)?;
            }
        }
        for (warning, names) in &self.warnings {
            writeln!(f, "{}", warning.heading())?;
            for name in names {
                writeln!(f, "      - {name}")?;
            }
        }
        if !self.runtime_errors.is_empty() {
            writeln!(f, "Errors")?;
            for (name, message) in &self.runtime_errors {
                writeln!(f, "      - {name}: {message}")?;
            }
        }
        Ok(())
    }
}
