use std::sync::Arc;

use super::{Repository, RepositoryKind};
use crate::package::PackageRecord;

/// A fixed list of records.
#[derive(Debug, Clone)]
pub struct ArrayRepository {
    kind: RepositoryKind,
    name: String,
    packages: Vec<Arc<PackageRecord>>,
}

impl ArrayRepository {
    pub fn new(kind: RepositoryKind, name: &str, packages: Vec<Arc<PackageRecord>>) -> Self {
        Self {
            kind,
            name: name.to_string(),
            packages,
        }
    }

    /// Repository holding only the project's own package.
    pub fn root(package: PackageRecord) -> Self {
        Self::new(RepositoryKind::Root, "root package", vec![Arc::new(package)])
    }
}

impl Repository for ArrayRepository {
    fn kind(&self) -> RepositoryKind {
        self.kind
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn packages(&self) -> Vec<Arc<PackageRecord>> {
        self.packages.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_repository() {
        let repo = ArrayRepository::root(PackageRecord::new("acme/app", "1.0").unwrap());
        assert_eq!(repo.kind(), RepositoryKind::Root);
        assert_eq!(repo.packages().len(), 1);
        assert!(repo.provider_names().is_none());
    }

    #[test]
    fn test_listing_is_restartable() {
        let repo = ArrayRepository::new(
            RepositoryKind::Remote,
            "inline",
            vec![
                Arc::new(PackageRecord::new("a/a", "1.0").unwrap()),
                Arc::new(PackageRecord::new("b/b", "1.0").unwrap()),
            ],
        );
        let first: Vec<String> = repo.packages().iter().map(|p| p.to_string()).collect();
        let second: Vec<String> = repo.packages().iter().map(|p| p.to_string()).collect();
        assert_eq!(first, second);
        assert_eq!(first, vec!["a/a 1.0", "b/b 1.0"]);
    }
}
