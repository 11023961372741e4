use log::{debug, warn};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{Repository, RepositoryKind};
use crate::package::PackageRecord;

/// Name of the pseudo-package carrying the engine's own version.
pub const ENGINE_PACKAGE: &str = "pkgquery";

/// A `config.platform` value from the root manifest.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PlatformValue {
    /// Pretend the package is present at this version.
    Version(String),
    /// `false` hides a detected package.
    Enabled(bool),
}

/// Pseudo-packages describing the machine the query runs on.
#[derive(Debug, Clone)]
pub struct PlatformRepository {
    packages: Vec<Arc<PackageRecord>>,
}

impl PlatformRepository {
    /// Detect the current platform, then apply manifest overrides.
    pub fn detect(overrides: &BTreeMap<String, PlatformValue>) -> Self {
        Self::with_detected(
            vec![
                (ENGINE_PACKAGE.to_string(), env!("CARGO_PKG_VERSION").to_string()),
                (format!("os-{}", detect_os()), "0".to_string()),
                (format!("arch-{}", detect_arch()), "0".to_string()),
            ],
            overrides,
        )
    }

    fn with_detected(
        detected: Vec<(String, String)>,
        overrides: &BTreeMap<String, PlatformValue>,
    ) -> Self {
        let mut entries: Vec<(String, String)> = detected
            .into_iter()
            .filter(|(name, _)| !overrides.contains_key(name))
            .collect();

        for (name, value) in overrides {
            match value {
                PlatformValue::Version(version) => entries.push((name.clone(), version.clone())),
                PlatformValue::Enabled(false) => debug!("Platform package {} disabled", name),
                PlatformValue::Enabled(true) => {
                    warn!("Ignoring platform override {}: true is not a version", name)
                }
            }
        }

        let packages = entries
            .into_iter()
            .filter_map(|(name, version)| match PackageRecord::new(&name, &version) {
                Ok(record) => Some(Arc::new(record)),
                Err(e) => {
                    warn!("Skipping platform package {}: {}", name, e);
                    None
                }
            })
            .collect();

        Self { packages }
    }
}

impl Repository for PlatformRepository {
    fn kind(&self) -> RepositoryKind {
        RepositoryKind::Platform
    }

    fn name(&self) -> String {
        "platform".to_string()
    }

    fn packages(&self) -> Vec<Arc<PackageRecord>> {
        self.packages.clone()
    }
}

fn detect_os() -> String {
    #[cfg(target_os = "macos")]
    {
        "macos".to_string()
    }
    #[cfg(target_os = "linux")]
    {
        "linux".to_string()
    }
    #[cfg(target_os = "windows")]
    {
        "windows".to_string()
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        std::env::consts::OS.to_string()
    }
}

fn detect_arch() -> String {
    #[cfg(target_arch = "x86_64")]
    {
        "x86_64".to_string()
    }
    #[cfg(target_arch = "aarch64")]
    {
        "aarch64".to_string()
    }
    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        std::env::consts::ARCH.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(repo: &PlatformRepository) -> Vec<String> {
        repo.packages().iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_detect_without_overrides() {
        let repo = PlatformRepository::detect(&BTreeMap::new());
        let packages = repo.packages();

        assert_eq!(packages.len(), 3);
        assert_eq!(packages[0].name(), ENGINE_PACKAGE);
        assert_eq!(packages[0].pretty_version(), env!("CARGO_PKG_VERSION"));
        assert!(packages[1].name().starts_with("os-"));
        assert!(packages[2].name().starts_with("arch-"));

        #[cfg(target_os = "linux")]
        assert_eq!(packages[1].name(), "os-linux");

        #[cfg(target_arch = "x86_64")]
        assert_eq!(packages[2].name(), "arch-x86_64");
    }

    #[test]
    fn test_overrides() {
        let detected = vec![
            ("pkgquery".to_string(), "0.1.0".to_string()),
            ("os-linux".to_string(), "0".to_string()),
            ("arch-x86_64".to_string(), "0".to_string()),
        ];
        let overrides: BTreeMap<String, PlatformValue> = serde_json::from_str(
            r#"{"php": "8.1.2", "os-linux": false, "arch-x86_64": "1", "ext-bad": "not a version"}"#,
        )
        .unwrap();

        let repo = PlatformRepository::with_detected(detected, &overrides);

        assert_eq!(names(&repo), vec!["pkgquery 0.1.0", "arch-x86_64 1", "php 8.1.2"]);
        assert_eq!(repo.kind(), RepositoryKind::Platform);
    }
}
