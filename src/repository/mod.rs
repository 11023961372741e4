//! Package repositories.
//!
//! A repository is a source of [`PackageRecord`]s. Every variant answers the
//! same small capability set: list its packages, check containment, and,
//! when configured for it, list package names without full metadata.
//!
//! - `array` - Fixed in-memory lists (root package, inline repositories)
//! - `platform` - Detected platform pseudo-packages
//! - `installed` - The project's installed packages
//! - `composer` - Remote Composer indexes
//! - `composite` - Ordered unions of other repositories

mod array;
mod composer;
mod composite;
mod installed;
mod platform;

use std::fmt;
use std::sync::Arc;

use crate::package::PackageRecord;

pub use array::ArrayRepository;
pub use composer::{ComposerRepository, RemoteRepositoryConfig};
pub use composite::CompositeRepository;
pub use installed::InstalledRepository;
pub use platform::{ENGINE_PACKAGE, PlatformRepository, PlatformValue};

/// Which variant a repository is, for logging and scope decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryKind {
    Root,
    Platform,
    Installed,
    Remote,
    ProviderIndexed,
    Composite,
}

impl fmt::Display for RepositoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RepositoryKind::Root => "root",
            RepositoryKind::Platform => "platform",
            RepositoryKind::Installed => "installed",
            RepositoryKind::Remote => "remote",
            RepositoryKind::ProviderIndexed => "provider-indexed",
            RepositoryKind::Composite => "composite",
        };
        write!(f, "{}", s)
    }
}

/// A source of package records.
#[cfg_attr(test, mockall::automock)]
pub trait Repository: Send + Sync {
    fn kind(&self) -> RepositoryKind;

    /// Human readable name (URL, file path, ...).
    fn name(&self) -> String;

    /// All records, in source order. Calling twice yields the same sequence.
    fn packages(&self) -> Vec<Arc<PackageRecord>>;

    /// Whether a record with the same name and normalized version is listed.
    fn has_package(&self, package: &PackageRecord) -> bool {
        self.packages().iter().any(|p| p.same_release(package))
    }

    /// Package names available without loading full metadata.
    ///
    /// `None` unless the repository is configured for name-only listing.
    fn provider_names(&self) -> Option<Vec<String>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_display() {
        assert_eq!(RepositoryKind::Root.to_string(), "root");
        assert_eq!(RepositoryKind::ProviderIndexed.to_string(), "provider-indexed");
        assert_eq!(RepositoryKind::Composite.to_string(), "composite");
    }

    #[test]
    fn test_has_package_agrees_with_packages() {
        let repo = ArrayRepository::new(
            RepositoryKind::Remote,
            "test",
            vec![
                Arc::new(PackageRecord::new("acme/widget", "1.0").unwrap()),
                Arc::new(PackageRecord::new("acme/gadget", "2.0").unwrap()),
            ],
        );

        for package in repo.packages() {
            assert!(repo.has_package(&package));
        }
        let other = PackageRecord::new("acme/widget", "1.1").unwrap();
        assert!(!repo.has_package(&other));
    }
}
