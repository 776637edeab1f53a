use std::fmt;
use std::path::{Component, Path};

use semver::Version;
use serde::Deserialize;

use crate::mod_system::error::ManifestError;
use crate::mod_system::version::parse_lenient;

/// A dependency declared in a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestDependency {
    pub unique_id: String,
    pub minimum_version: Option<Version>,
    pub is_required: bool,
}

impl ManifestDependency {
    pub fn required(unique_id: impl Into<String>) -> Self {
        Self {
            unique_id: unique_id.into(),
            minimum_version: None,
            is_required: true,
        }
    }

    pub fn optional(unique_id: impl Into<String>) -> Self {
        Self {
            unique_id: unique_id.into(),
            minimum_version: None,
            is_required: false,
        }
    }

    pub fn with_minimum(mut self, version: Version) -> Self {
        self.minimum_version = Some(version);
        self
    }
}

impl fmt::Display for ManifestDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.unique_id)?;
        if let Some(min) = &self.minimum_version {
            write!(f, " (>= {min})")?;
        }
        if !self.is_required {
            write!(f, " [optional]")?;
        }
        Ok(())
    }
}

/// Immutable description of a mod, read once from its `manifest.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    /// Unique ID, compared case-insensitively
    pub unique_id: String,
    /// Display name
    pub name: String,
    pub version: Version,
    pub author: Option<String>,
    pub description: Option<String>,
    /// Oldest host API version this mod works with
    pub minimum_api_version: Option<Version>,
    /// Library file relative to the mod folder, for code mods
    pub entry_point: Option<String>,
    /// Owning mod ID, for content bundles
    pub content_bundle_for: Option<String>,
    pub dependencies: Vec<ManifestDependency>,
    pub update_keys: Vec<String>,
}

impl Manifest {
    pub fn is_content_bundle(&self) -> bool {
        self.content_bundle_for.is_some()
    }

    pub fn has_id(&self, id: &str) -> bool {
        self.unique_id.eq_ignore_ascii_case(id)
    }

    /// Required dependency IDs, lower-cased.
    pub fn required_ids(&self) -> impl Iterator<Item = String> + '_ {
        self.dependencies
            .iter()
            .filter(|d| d.is_required)
            .map(|d| d.unique_id.to_lowercase())
    }

    /// Parse and check a manifest document.
    pub fn from_json(content: &str) -> Result<Self, (ManifestError, Option<String>)> {
        let raw: RawManifest =
            serde_json::from_str(content).map_err(|e| (ManifestError::Unparsable, Some(e.to_string())))?;
        raw.into_manifest().map_err(|e| (e, None))
    }
}

/// On-disk manifest layout.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawManifest {
    #[serde(default, rename = "UniqueID", alias = "UniqueId")]
    unique_id: Option<String>,
    #[serde(default, alias = "name")]
    name: Option<String>,
    #[serde(default, alias = "version")]
    version: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    minimum_api_version: Option<String>,
    #[serde(default)]
    entry_point: Option<String>,
    #[serde(default, rename = "ContentBundleForID", alias = "ContentBundleForId")]
    content_bundle_for_id: Option<String>,
    #[serde(default)]
    dependencies: Vec<RawDependency>,
    #[serde(default)]
    update_keys: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawDependency {
    #[serde(default, rename = "UniqueID", alias = "UniqueId")]
    unique_id: Option<String>,
    #[serde(default)]
    minimum_version: Option<String>,
    #[serde(default = "default_required")]
    is_required: bool,
}

fn default_required() -> bool {
    true
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn is_valid_id(id: &str) -> bool {
    id.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
}

fn is_safe_relative(path: &str) -> bool {
    let path = Path::new(path);
    !path.is_absolute() && path.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

impl RawManifest {
    fn into_manifest(self) -> Result<Manifest, ManifestError> {
        let unique_id = non_empty(self.unique_id).ok_or(ManifestError::MissingField("UniqueID"))?;
        if !is_valid_id(&unique_id) {
            return Err(ManifestError::InvalidUniqueId(unique_id));
        }
        let name = non_empty(self.name).ok_or(ManifestError::MissingField("Name"))?;
        let raw_version = non_empty(self.version).ok_or(ManifestError::MissingField("Version"))?;
        let version = parse_lenient(&raw_version).ok_or(ManifestError::InvalidVersion {
            field: "Version",
            value: raw_version.clone(),
        })?;
        let minimum_api_version = match non_empty(self.minimum_api_version) {
            Some(raw) => Some(parse_lenient(&raw).ok_or(ManifestError::InvalidVersion {
                field: "MinimumApiVersion",
                value: raw.clone(),
            })?),
            None => None,
        };

        let entry_point = non_empty(self.entry_point);
        let content_bundle_for = non_empty(self.content_bundle_for_id);
        match (&entry_point, &content_bundle_for) {
            (Some(_), Some(_)) => return Err(ManifestError::BothEntryAndOwner),
            (None, None) => return Err(ManifestError::NoEntryOrOwner),
            (Some(entry), None) if !is_safe_relative(entry) => {
                return Err(ManifestError::UnsafeEntryPoint(entry.clone()));
            }
            _ => {}
        }

        let mut dependencies = Vec::with_capacity(self.dependencies.len());
        for raw in self.dependencies {
            let unique_id = non_empty(raw.unique_id).ok_or(ManifestError::MissingField("Dependencies[].UniqueID"))?;
            let minimum_version = match non_empty(raw.minimum_version) {
                Some(v) => Some(parse_lenient(&v).ok_or(ManifestError::InvalidVersion {
                    field: "Dependencies[].MinimumVersion",
                    value: v.clone(),
                })?),
                None => None,
            };
            dependencies.push(ManifestDependency {
                unique_id,
                minimum_version,
                is_required: raw.is_required,
            });
        }

        Ok(Manifest {
            unique_id,
            name,
            version,
            author: non_empty(self.author),
            description: non_empty(self.description),
            minimum_api_version,
            entry_point,
            content_bundle_for,
            dependencies,
            update_keys: self
                .update_keys
                .into_iter()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect(),
        })
    }
}

/// Builder for manifests, mostly for hosts registering mods in code and for tests.
#[derive(Debug, Clone)]
pub struct ManifestBuilder {
    manifest: Manifest,
}

impl ManifestBuilder {
    /// Start a code mod manifest with the given entry point.
    pub fn code(unique_id: impl Into<String>, name: impl Into<String>, entry_point: impl Into<String>) -> Self {
        Self::base(unique_id, name, Some(entry_point.into()), None)
    }

    /// Start a content bundle manifest owned by `owner`.
    pub fn content_bundle(unique_id: impl Into<String>, name: impl Into<String>, owner: impl Into<String>) -> Self {
        Self::base(unique_id, name, None, Some(owner.into()))
    }

    fn base(unique_id: impl Into<String>, name: impl Into<String>, entry: Option<String>, owner: Option<String>) -> Self {
        Self {
            manifest: Manifest {
                unique_id: unique_id.into(),
                name: name.into(),
                version: Version::new(1, 0, 0),
                author: None,
                description: None,
                minimum_api_version: None,
                entry_point: entry,
                content_bundle_for: owner,
                dependencies: Vec::new(),
                update_keys: Vec::new(),
            },
        }
    }

    pub fn version(mut self, version: Version) -> Self {
        self.manifest.version = version;
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.manifest.author = Some(author.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.manifest.description = Some(description.into());
        self
    }

    pub fn minimum_api_version(mut self, version: Version) -> Self {
        self.manifest.minimum_api_version = Some(version);
        self
    }

    pub fn dependency(mut self, dependency: ManifestDependency) -> Self {
        self.manifest.dependencies.push(dependency);
        self
    }

    pub fn update_key(mut self, key: impl Into<String>) -> Self {
        self.manifest.update_keys.push(key.into());
        self
    }

    pub fn build(self) -> Manifest {
        self.manifest
    }
}
