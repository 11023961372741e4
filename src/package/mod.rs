//! Package records.
//!
//! A [`PackageRecord`] describes one release of one package: its canonical
//! (lower-cased) name, its version and the names it provides or replaces.

mod data;

use serde::{Serialize, Serializer};
use std::fmt;

use crate::version::{ConstraintError, Version};

pub use data::{OneOrMany, PackageData};
pub(crate) use data::{into_records, link_map};

/// How a package claims another name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    Provide,
    Replace,
}

/// A `provide` or `replace` declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    /// Lower-cased target package name
    pub target: String,
    pub kind: LinkKind,
    /// Constraint as written in the metadata
    pub constraint: String,
}

/// One release of a package.
#[derive(Debug, Clone)]
pub struct PackageRecord {
    name: String,
    pretty_name: String,
    version: Version,
    links: Vec<Link>,
    description: Option<String>,
    package_type: Option<String>,
}

impl PackageRecord {
    pub fn new(name: &str, version: &str) -> Result<Self, ConstraintError> {
        Ok(Self::from_version(name, Version::parse(version)?))
    }

    pub fn from_version(name: &str, version: Version) -> Self {
        let pretty_name = name.trim().to_string();
        Self {
            name: pretty_name.to_lowercase(),
            pretty_name,
            version,
            links: Vec::new(),
            description: None,
            package_type: None,
        }
    }

    pub fn with_provide(self, target: &str, constraint: &str) -> Self {
        self.link(LinkKind::Provide, target, constraint)
    }

    pub fn with_replace(self, target: &str, constraint: &str) -> Self {
        self.link(LinkKind::Replace, target, constraint)
    }

    fn link(mut self, kind: LinkKind, target: &str, constraint: &str) -> Self {
        self.links.push(Link {
            target: target.trim().to_lowercase(),
            kind,
            constraint: constraint.to_string(),
        });
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_type(mut self, package_type: impl Into<String>) -> Self {
        self.package_type = Some(package_type.into());
        self
    }

    /// Canonical (lower-cased) name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pretty_name(&self) -> &str {
        &self.pretty_name
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn pretty_version(&self) -> &str {
        self.version.pretty()
    }

    pub fn normalized_version(&self) -> &str {
        self.version.normalized()
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Names this record can be found under besides its own.
    pub fn provided_names(&self) -> impl Iterator<Item = &str> {
        self.links.iter().map(|l| l.target.as_str())
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn package_type(&self) -> Option<&str> {
        self.package_type.as_deref()
    }

    /// Same package name and same normalized version.
    pub fn same_release(&self, other: &PackageRecord) -> bool {
        self.name == other.name && self.version == other.version
    }
}

impl fmt::Display for PackageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.pretty_name, self.version.pretty())
    }
}

#[derive(Serialize)]
struct PackageView<'a> {
    name: &'a str,
    pretty_name: &'a str,
    version: &'a str,
    version_normalized: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    package_type: Option<&'a str>,
    #[serde(skip_serializing_if = "no_links")]
    links: &'a [Link],
}

fn no_links(links: &&[Link]) -> bool {
    links.is_empty()
}

impl Serialize for PackageRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        PackageView {
            name: &self.name,
            pretty_name: &self.pretty_name,
            version: self.version.pretty(),
            version_normalized: self.version.normalized(),
            description: self.description.as_deref(),
            package_type: self.package_type.as_deref(),
            links: &self.links,
        }
        .serialize(serializer)
    }
}
