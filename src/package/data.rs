//! Package metadata as it appears in manifests and repository indexes.

use log::warn;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::PackageRecord;
use crate::version::{ConstraintError, Version};

/// Raw package entry (`composer.json`, `installed.json`, `packages.json`).
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct PackageData {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub version_normalized: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "type")]
    pub package_type: Option<String>,
    #[serde(default, deserialize_with = "link_map")]
    pub provide: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "link_map")]
    pub replace: BTreeMap<String, String>,
}

/// A single value or a list of them.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

/// Link maps serialized from an empty PHP array come out as `[]`.
pub(crate) fn link_map<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<BTreeMap<String, String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Map(BTreeMap<String, String>),
        List(Vec<serde_json::Value>),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Map(map) => map,
        Raw::List(_) => BTreeMap::new(),
    })
}

impl TryFrom<PackageData> for PackageRecord {
    type Error = ConstraintError;

    fn try_from(data: PackageData) -> Result<Self, Self::Error> {
        let version = match &data.version_normalized {
            Some(normalized) => Version::parse(normalized)?.with_pretty(&data.version),
            None => Version::parse(&data.version)?,
        };

        let mut record = PackageRecord::from_version(&data.name, version);
        for (target, constraint) in &data.provide {
            record = record.with_provide(target, constraint);
        }
        for (target, constraint) in &data.replace {
            record = record.with_replace(target, constraint);
        }
        if let Some(description) = data.description {
            record = record.with_description(description);
        }
        if let Some(package_type) = data.package_type {
            record = record.with_type(package_type);
        }
        Ok(record)
    }
}

/// Convert raw entries, skipping the ones whose version cannot be parsed.
pub(crate) fn into_records(
    entries: impl IntoIterator<Item = PackageData>,
    origin: &str,
) -> Vec<Arc<PackageRecord>> {
    entries
        .into_iter()
        .filter_map(|data| {
            let label = format!("{} {}", data.name, data.version);
            match PackageRecord::try_from(data) {
                Ok(record) => Some(Arc::new(record)),
                Err(e) => {
                    warn!("Skipping {} from {}: {}", label, origin, e);
                    None
                }
            }
        })
        .collect()
}
