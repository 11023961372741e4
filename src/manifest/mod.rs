//! Root project manifest (`composer.json`).

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::package::{OneOrMany, PackageData, PackageRecord};
use crate::repository::{PlatformValue, RemoteRepositoryConfig};
use crate::runtime::Runtime;
use crate::version::{Stability, Version};

pub const MANIFEST_FILE: &str = "composer.json";
pub const ROOT_PACKAGE_NAME: &str = "__root__";
pub const ROOT_PACKAGE_VERSION: &str = "1.0.0+no-version-set";

const DEFAULT_VENDOR_DIR: &str = "vendor";
const DEFAULT_REPOSITORY_KEYS: [&str; 2] = ["packagist.org", "packagist"];

/// A `repositories` entry that the engine knows how to query.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RepositoryDefinition {
    Composer {
        url: String,
        #[serde(default, rename = "lazy-listing")]
        lazy_listing: bool,
    },
    Package {
        package: OneOrMany<PackageData>,
    },
    /// vcs, path, artifact and other types needing a download step.
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RepositoryEntry {
    Definition(RepositoryDefinition),
    /// `{"packagist.org": false}`
    Toggle { name: String, enabled: bool },
}

/// A repository to materialize for a query.
#[derive(Debug, Clone, PartialEq)]
pub enum RepositorySource {
    Composer(RemoteRepositoryConfig),
    Inline(Vec<PackageData>),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ManifestConfig {
    #[serde(default)]
    pub platform: BTreeMap<String, PlatformValue>,
    #[serde(default, rename = "vendor-dir")]
    pub vendor_dir: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RootManifest {
    #[serde(skip)]
    dir: PathBuf,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "type")]
    pub package_type: Option<String>,
    #[serde(default, deserialize_with = "crate::package::link_map")]
    pub provide: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "crate::package::link_map")]
    pub replace: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "repository_entries")]
    pub repositories: Vec<RepositoryEntry>,
    #[serde(default)]
    pub config: ManifestConfig,
    #[serde(default, rename = "minimum-stability")]
    pub minimum_stability: Option<Stability>,
}

impl RootManifest {
    /// Manifest of a project without `composer.json`.
    pub fn empty(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            ..Default::default()
        }
    }

    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime + ?Sized>(runtime: &R, path: &Path) -> Result<Self> {
        let content = runtime.read_to_string(path)?;
        let mut manifest: RootManifest = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse manifest {:?}", path))?;
        manifest.dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(manifest)
    }

    /// Load `composer.json` from `dir` if there is one.
    pub fn find<R: Runtime + ?Sized>(runtime: &R, dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(MANIFEST_FILE);
        if !runtime.exists(&path) {
            debug!("No manifest at {:?}", path);
            return Ok(None);
        }
        Self::load(runtime, &path).map(Some)
    }

    /// The project's own package.
    pub fn root_package(&self) -> Result<PackageRecord> {
        let name = self.name.as_deref().unwrap_or(ROOT_PACKAGE_NAME);
        let version = self.version.as_deref().unwrap_or(ROOT_PACKAGE_VERSION);
        let version = Version::parse(version)
            .with_context(|| format!("Invalid version in manifest of {}", name))?;

        let mut package = PackageRecord::from_version(name, version);
        for (target, constraint) in &self.provide {
            package = package.with_provide(target, constraint);
        }
        for (target, constraint) in &self.replace {
            package = package.with_replace(target, constraint);
        }
        if let Some(description) = &self.description {
            package = package.with_description(description.as_str());
        }
        if let Some(package_type) = &self.package_type {
            package = package.with_type(package_type.as_str());
        }
        Ok(package)
    }

    pub fn vendor_dir(&self) -> PathBuf {
        self.dir
            .join(self.config.vendor_dir.as_deref().unwrap_or(DEFAULT_VENDOR_DIR))
    }

    pub fn installed_path(&self) -> PathBuf {
        self.vendor_dir().join("composer").join("installed.json")
    }

    pub fn platform_overrides(&self) -> &BTreeMap<String, PlatformValue> {
        &self.config.platform
    }

    /// Declared repositories followed by `defaults`, unless disabled.
    pub fn repository_sources(&self, defaults: &[RemoteRepositoryConfig]) -> Vec<RepositorySource> {
        let mut sources = Vec::new();
        let mut use_defaults = true;

        for (position, entry) in self.repositories.iter().enumerate() {
            match entry {
                RepositoryEntry::Definition(RepositoryDefinition::Composer { url, lazy_listing }) => {
                    sources.push(RepositorySource::Composer(
                        RemoteRepositoryConfig::new(url).lazy_listing(*lazy_listing),
                    ));
                }
                RepositoryEntry::Definition(RepositoryDefinition::Package { package }) => {
                    sources.push(RepositorySource::Inline(package.clone().into_vec()));
                }
                RepositoryEntry::Definition(RepositoryDefinition::Unsupported) => {
                    warn!("Skipping repository #{}: unsupported type", position);
                }
                RepositoryEntry::Toggle { name, enabled } => {
                    if DEFAULT_REPOSITORY_KEYS.contains(&name.as_str()) {
                        use_defaults = *enabled;
                    } else {
                        warn!("Ignoring unknown repository toggle {}", name);
                    }
                }
            }
        }

        if use_defaults {
            sources.extend(defaults.iter().cloned().map(RepositorySource::Composer));
        } else {
            debug!("Default repositories disabled by manifest");
        }
        sources
    }
}

/// `repositories` is either a list or an object keyed by repository name.
fn repository_entries<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<RepositoryEntry>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ListItem {
        Definition(RepositoryDefinition),
        Toggle(BTreeMap<String, bool>),
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum MapValue {
        Definition(RepositoryDefinition),
        Enabled(bool),
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<ListItem>),
        Map(BTreeMap<String, MapValue>),
    }

    let entries = match Raw::deserialize(deserializer)? {
        Raw::List(items) => items
            .into_iter()
            .flat_map(|item| match item {
                ListItem::Definition(definition) => vec![RepositoryEntry::Definition(definition)],
                ListItem::Toggle(toggles) => toggles
                    .into_iter()
                    .map(|(name, enabled)| RepositoryEntry::Toggle { name, enabled })
                    .collect(),
            })
            .collect(),
        Raw::Map(by_name) => by_name
            .into_iter()
            .map(|(name, value)| match value {
                MapValue::Definition(definition) => RepositoryEntry::Definition(definition),
                MapValue::Enabled(enabled) => RepositoryEntry::Toggle { name, enabled },
            })
            .collect(),
    };
    Ok(entries)
}
