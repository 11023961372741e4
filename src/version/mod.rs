//! Version normalization and ordering.
//!
//! Versions are normalized to the four-component form used by Composer
//! (`1.2` becomes `1.2.0.0`, `2.0-rc1` becomes `2.0.0.0-RC1`). Named
//! branches (`dev-main`) are kept as branches and only compare by name.

mod constraint;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

pub use constraint::{ConstraintError, VersionConstraint};

/// Placeholder used for `x`/`*` components of wildcard branch versions.
const WILDCARD_COMPONENT: u64 = 9_999_999;

static CLASSICAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^v?(\d{1,10})(?:\.(\d+))?(?:\.(\d+))?(?:\.(\d+))?(?:[._-]?(stable|beta|b|rc|alpha|a|patch|pl|p)(?:[.-]?(\d+))?)?([.-]?dev)?$",
    )
    .expect("classical version pattern is valid")
});

static WILDCARD_BRANCH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^v?(\d+)(?:\.(\d+|[x*]))?(?:\.(\d+|[x*]))?(?:\.(\d+|[x*]))?[.-]dev$")
        .expect("wildcard branch pattern is valid")
});

static ALIAS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^,\s]+) +as +[^,\s]+$").expect("inline alias pattern is valid")
});

/// Package stability, ordered from least to most stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stability {
    #[default]
    Dev,
    Alpha,
    Beta,
    #[serde(rename = "RC")]
    RC,
    Stable,
}

impl fmt::Display for Stability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stability::Dev => write!(f, "dev"),
            Stability::Alpha => write!(f, "alpha"),
            Stability::Beta => write!(f, "beta"),
            Stability::RC => write!(f, "RC"),
            Stability::Stable => write!(f, "stable"),
        }
    }
}

impl FromStr for Stability {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Stability::Dev),
            "alpha" => Ok(Stability::Alpha),
            "beta" => Ok(Stability::Beta),
            "rc" => Ok(Stability::RC),
            "stable" => Ok(Stability::Stable),
            _ => anyhow::bail!(
                "Unknown stability: {}. Expected dev, alpha, beta, RC or stable.",
                s
            ),
        }
    }
}

impl<'de> Deserialize<'de> for Stability {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Pre-release / post-release marker of a numeric version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Modifier {
    Dev,
    Alpha,
    Beta,
    RC,
    Stable,
    Patch,
}

impl Modifier {
    fn from_tag(tag: &str) -> Self {
        match tag.to_lowercase().as_str() {
            "alpha" | "a" => Modifier::Alpha,
            "beta" | "b" => Modifier::Beta,
            "rc" => Modifier::RC,
            "patch" | "pl" | "p" => Modifier::Patch,
            _ => Modifier::Stable,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Modifier::Dev => "dev",
            Modifier::Alpha => "alpha",
            Modifier::Beta => "beta",
            Modifier::RC => "RC",
            Modifier::Stable => "",
            Modifier::Patch => "patch",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Numeric {
    parts: [u64; 4],
    modifier: Modifier,
    modifier_number: Option<u64>,
    dev: bool,
}

impl Numeric {
    fn stable(parts: [u64; 4]) -> Self {
        Self {
            parts,
            modifier: Modifier::Stable,
            modifier_number: None,
            dev: false,
        }
    }

    fn render(&self) -> String {
        let [a, b, c, d] = self.parts;
        let mut out = format!("{}.{}.{}.{}", a, b, c, d);
        if self.modifier != Modifier::Stable {
            out.push('-');
            out.push_str(self.modifier.label());
            if let Some(n) = self.modifier_number {
                out.push_str(&n.to_string());
            }
        }
        if self.dev {
            out.push_str("-dev");
        }
        out
    }
}

impl Ord for Numeric {
    fn cmp(&self, other: &Self) -> Ordering {
        self.parts
            .cmp(&other.parts)
            .then(self.modifier.cmp(&other.modifier))
            .then(self.modifier_number.cmp(&other.modifier_number))
            // "-beta1-dev" sorts below "-beta1"
            .then(other.dev.cmp(&self.dev))
    }
}

impl PartialOrd for Numeric {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Repr {
    Numeric(Numeric),
    Branch(String),
}

/// A parsed package version.
///
/// Equality and ordering only look at the normalized form; the pretty
/// string is kept for display.
#[derive(Debug, Clone)]
pub struct Version {
    pretty: String,
    normalized: String,
    repr: Repr,
}

impl Version {
    /// Parse and normalize a version string.
    pub fn parse(input: &str) -> Result<Self, ConstraintError> {
        let pretty = input.trim();
        let repr = Self::parse_repr(pretty)
            .ok_or_else(|| ConstraintError::InvalidVersion(input.to_string()))?;
        let normalized = match &repr {
            Repr::Numeric(numeric) => numeric.render(),
            Repr::Branch(name) => format!("dev-{}", name),
        };
        Ok(Self {
            pretty: pretty.to_string(),
            normalized,
            repr,
        })
    }

    fn parse_repr(input: &str) -> Option<Repr> {
        if input.is_empty() {
            return None;
        }

        let mut version = input;
        if let Some(caps) = ALIAS.captures(version) {
            version = caps.get(1)?.as_str();
        }
        // Build metadata never takes part in comparisons.
        if let Some((head, _build)) = version.split_once('+') {
            version = head;
        }

        if matches!(
            version.to_lowercase().as_str(),
            "master" | "trunk" | "default"
        ) {
            return Some(Repr::Branch(version.to_lowercase()));
        }
        if let Some(branch) = version.strip_prefix("dev-") {
            if branch.is_empty() || branch.contains(char::is_whitespace) {
                return None;
            }
            return Some(Repr::Branch(branch.to_string()));
        }

        if let Some(caps) = CLASSICAL.captures(version) {
            let mut parts = [0u64; 4];
            for (slot, part) in parts.iter_mut().enumerate() {
                if let Some(m) = caps.get(slot + 1) {
                    *part = m.as_str().parse().ok()?;
                }
            }
            let tagged = caps.get(5).map(|m| Modifier::from_tag(m.as_str()));
            let modifier_number = match caps.get(6) {
                Some(m) => Some(m.as_str().parse().ok()?),
                None => None,
            };
            let dev = caps.get(7).is_some();
            let numeric = match tagged {
                Some(modifier) if modifier != Modifier::Stable => Numeric {
                    parts,
                    modifier,
                    modifier_number,
                    dev,
                },
                _ if dev => Numeric {
                    parts,
                    modifier: Modifier::Dev,
                    modifier_number: None,
                    dev: false,
                },
                _ => Numeric::stable(parts),
            };
            return Some(Repr::Numeric(numeric));
        }

        if let Some(caps) = WILDCARD_BRANCH.captures(version) {
            let mut parts = [WILDCARD_COMPONENT; 4];
            for (slot, part) in parts.iter_mut().enumerate() {
                match caps.get(slot + 1).map(|m| m.as_str()) {
                    Some(value) if value.chars().all(|c| c.is_ascii_digit()) => {
                        *part = value.parse().ok()?;
                    }
                    _ => {}
                }
            }
            return Some(Repr::Numeric(Numeric {
                parts,
                modifier: Modifier::Dev,
                modifier_number: None,
                dev: false,
            }));
        }

        None
    }

    /// Numeric version `a.b.c.d-dev`, the lowest release of `a.b.c.d`.
    pub(crate) fn dev_floor(parts: [u64; 4]) -> Self {
        let numeric = Numeric {
            parts,
            modifier: Modifier::Dev,
            modifier_number: None,
            dev: false,
        };
        let normalized = numeric.render();
        Self {
            pretty: normalized.clone(),
            normalized,
            repr: Repr::Numeric(numeric),
        }
    }

    /// Replace the display string, keeping the normalized value.
    pub fn with_pretty(mut self, pretty: &str) -> Self {
        self.pretty = pretty.to_string();
        self
    }

    pub fn pretty(&self) -> &str {
        &self.pretty
    }

    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    /// Named branches (`dev-main`) only match exact constraints.
    pub fn is_branch(&self) -> bool {
        matches!(self.repr, Repr::Branch(_))
    }

    pub(crate) fn parts(&self) -> Option<[u64; 4]> {
        match &self.repr {
            Repr::Numeric(numeric) => Some(numeric.parts),
            Repr::Branch(_) => None,
        }
    }

    /// True for a plain release without any stability modifier.
    pub(crate) fn is_plain_release(&self) -> bool {
        matches!(&self.repr, Repr::Numeric(n) if n.modifier == Modifier::Stable && !n.dev)
    }

    pub fn stability(&self) -> Stability {
        match &self.repr {
            Repr::Branch(_) => Stability::Dev,
            Repr::Numeric(n) if n.dev => Stability::Dev,
            Repr::Numeric(n) => match n.modifier {
                Modifier::Dev => Stability::Dev,
                Modifier::Alpha => Stability::Alpha,
                Modifier::Beta => Stability::Beta,
                Modifier::RC => Stability::RC,
                Modifier::Stable | Modifier::Patch => Stability::Stable,
            },
        }
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.normalized == other.normalized
    }
}

impl Eq for Version {}

impl std::hash::Hash for Version {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.normalized.hash(state);
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        match (&self.repr, &other.repr) {
            (Repr::Numeric(a), Repr::Numeric(b)) => a.cmp(b),
            (Repr::Branch(a), Repr::Branch(b)) => a.cmp(b),
            (Repr::Branch(_), Repr::Numeric(_)) => Ordering::Less,
            (Repr::Numeric(_), Repr::Branch(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pretty)
    }
}

impl FromStr for Version {
    type Err = ConstraintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}
