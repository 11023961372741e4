use anyhow::{Context, Result, anyhow};
use log::{debug, info, warn};
use reqwest::Url;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use super::{Repository, RepositoryKind};
use crate::http::MetadataFetcher;
use crate::package::{PackageData, PackageRecord, into_records};

const PACKAGE_PLACEHOLDER: &str = "%package%";
const MINIFIED_FORMAT: &str = "composer/2.0";
const UNSET_MARKER: &str = "__unset";

/// Where a remote repository lives and how it may be listed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteRepositoryConfig {
    pub url: String,
    /// List package names from the index instead of loading every package.
    #[serde(default, rename = "lazy-listing")]
    pub lazy_listing: bool,
}

impl RemoteRepositoryConfig {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            lazy_listing: false,
        }
    }

    pub fn lazy_listing(mut self, enabled: bool) -> Self {
        self.lazy_listing = enabled;
        self
    }

    /// URL of the repository's `packages.json`.
    pub fn index_url(&self) -> String {
        if self.url.ends_with(".json") {
            self.url.clone()
        } else {
            format!("{}/packages.json", self.url.trim_end_matches('/'))
        }
    }
}

#[derive(Deserialize)]
struct PackagesIndex {
    #[serde(default)]
    packages: Value,
    #[serde(default, rename = "metadata-url")]
    metadata_url: Option<String>,
    #[serde(default, rename = "available-packages")]
    available_packages: Vec<String>,
    #[serde(default)]
    providers: BTreeMap<String, Value>,
}

#[derive(Deserialize)]
struct MetadataDocument {
    #[serde(default)]
    packages: BTreeMap<String, Vec<Value>>,
    #[serde(default)]
    minified: Option<String>,
}

/// A remote Composer repository.
///
/// Inline packages of the index are available right after [`fetch`];
/// packages behind a `metadata-url` are loaded per name with
/// [`load_package`] or all at once with [`load_all`].
///
/// [`fetch`]: ComposerRepository::fetch
/// [`load_package`]: ComposerRepository::load_package
/// [`load_all`]: ComposerRepository::load_all
#[derive(Debug, Clone)]
pub struct ComposerRepository {
    config: RemoteRepositoryConfig,
    index_url: String,
    metadata_url: Option<String>,
    available: BTreeSet<String>,
    packages: Vec<Arc<PackageRecord>>,
    loaded: HashSet<String>,
}

impl ComposerRepository {
    /// Download and parse the repository index.
    #[tracing::instrument(skip(fetcher))]
    pub async fn fetch<F: MetadataFetcher + ?Sized>(
        fetcher: &F,
        config: RemoteRepositoryConfig,
    ) -> Result<Self> {
        let index_url = config.index_url();
        let value = fetcher
            .fetch_json(&index_url)
            .await?
            .ok_or_else(|| anyhow!("Repository index {} not found", index_url))?;
        let index: PackagesIndex = serde_json::from_value(value)
            .with_context(|| format!("Failed to parse repository index {}", index_url))?;

        let packages = into_records(inline_entries(&index.packages), &index_url);
        let available: BTreeSet<String> = index
            .available_packages
            .iter()
            .chain(index.providers.keys())
            .map(|name| name.to_lowercase())
            .collect();

        info!(
            "Loaded index {}: {} inline package(s), {} lazily available name(s)",
            index_url,
            packages.len(),
            available.len()
        );

        Ok(Self {
            config,
            index_url,
            metadata_url: index.metadata_url,
            available,
            packages,
            loaded: HashSet::new(),
        })
    }

    pub fn config(&self) -> &RemoteRepositoryConfig {
        &self.config
    }

    /// Load every version of one package through the `metadata-url`.
    ///
    /// Returns the number of records added. A package the server does not
    /// know (404) adds nothing. Each name is fetched at most once.
    #[tracing::instrument(skip(self, fetcher))]
    pub async fn load_package<F: MetadataFetcher + ?Sized>(
        &mut self,
        fetcher: &F,
        name: &str,
    ) -> Result<usize> {
        let name = name.to_lowercase();
        let Some(template) = &self.metadata_url else {
            return Ok(0);
        };
        if !self.loaded.insert(name.clone()) {
            return Ok(0);
        }

        let url = Url::parse(&self.index_url)
            .and_then(|base| base.join(&template.replace(PACKAGE_PLACEHOLDER, &name)))
            .with_context(|| format!("Invalid metadata URL {} for {}", template, name))?;

        let Some(value) = fetcher.fetch_json(url.as_str()).await? else {
            debug!("{} has no metadata for {}", self.config.url, name);
            return Ok(0);
        };
        let document: MetadataDocument = serde_json::from_value(value)
            .with_context(|| format!("Failed to parse package metadata {}", url))?;

        let minified = document.minified.as_deref() == Some(MINIFIED_FORMAT);
        let entries = document
            .packages
            .into_iter()
            .find(|(key, _)| key.to_lowercase() == name)
            .map(|(_, entries)| entries)
            .unwrap_or_default();
        let entries = if minified {
            expand_minified(entries)
        } else {
            entries
        };

        let records = into_records(
            entries.into_iter().filter_map(|entry| entry_data(&name, entry)),
            url.as_str(),
        );
        debug!("Loaded {} version(s) of {} from {}", records.len(), name, url);

        let count = records.len();
        self.packages.extend(records);
        Ok(count)
    }

    /// Load every lazily available package.
    #[tracing::instrument(skip(self, fetcher))]
    pub async fn load_all<F: MetadataFetcher + ?Sized>(&mut self, fetcher: &F) -> Result<usize> {
        let names: Vec<String> = self.available.iter().cloned().collect();
        if !names.is_empty() {
            info!(
                "Loading metadata of {} package(s) from {}",
                names.len(),
                self.config.url
            );
        }

        let mut count = 0;
        for name in names {
            count += self.load_package(fetcher, &name).await?;
        }
        Ok(count)
    }
}

impl Repository for ComposerRepository {
    fn kind(&self) -> RepositoryKind {
        if self.config.lazy_listing {
            RepositoryKind::ProviderIndexed
        } else {
            RepositoryKind::Remote
        }
    }

    fn name(&self) -> String {
        self.config.url.clone()
    }

    fn packages(&self) -> Vec<Arc<PackageRecord>> {
        self.packages.clone()
    }

    fn provider_names(&self) -> Option<Vec<String>> {
        if !self.config.lazy_listing {
            return None;
        }
        let names: BTreeSet<String> = self
            .available
            .iter()
            .cloned()
            .chain(self.packages.iter().map(|p| p.name().to_string()))
            .collect();
        Some(names.into_iter().collect())
    }
}

/// Entries of the index's inline `packages` field.
///
/// Each name maps to either a version map or a list; an empty index is `[]`.
fn inline_entries(packages: &Value) -> Vec<PackageData> {
    let Value::Object(by_name) = packages else {
        return Vec::new();
    };

    let mut entries = Vec::new();
    for (name, versions) in by_name {
        let raw: Vec<Value> = match versions {
            Value::Object(by_version) => by_version.values().cloned().collect(),
            Value::Array(list) => list.clone(),
            _ => {
                warn!("Ignoring malformed entry for {} in repository index", name);
                continue;
            }
        };
        entries.extend(raw.into_iter().filter_map(|entry| entry_data(name, entry)));
    }
    entries
}

fn entry_data(name: &str, entry: Value) -> Option<PackageData> {
    let Value::Object(mut fields) = entry else {
        warn!("Ignoring non-object metadata entry for {}", name);
        return None;
    };
    fields
        .entry("name")
        .or_insert_with(|| Value::String(name.to_string()));

    match serde_json::from_value(Value::Object(fields)) {
        Ok(data) => Some(data),
        Err(e) => {
            warn!("Ignoring metadata entry for {}: {}", name, e);
            None
        }
    }
}

/// Expand `composer/2.0` minified metadata.
///
/// Every entry only lists the fields that differ from the previous one;
/// `"__unset"` removes a field.
fn expand_minified(entries: Vec<Value>) -> Vec<Value> {
    let mut expanded = Vec::with_capacity(entries.len());
    let mut current: Map<String, Value> = Map::new();

    for entry in entries {
        let Value::Object(fields) = entry else {
            continue;
        };
        for (key, value) in fields {
            if value.as_str() == Some(UNSET_MARKER) {
                current.remove(&key);
            } else {
                current.insert(key, value);
            }
        }
        expanded.push(Value::Object(current.clone()));
    }
    expanded
}
