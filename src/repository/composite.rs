use std::sync::Arc;

use super::{Repository, RepositoryKind};
use crate::package::PackageRecord;

/// Ordered union of repositories.
#[derive(Clone, Default)]
pub struct CompositeRepository {
    repositories: Vec<Arc<dyn Repository>>,
}

impl CompositeRepository {
    pub fn new(repositories: Vec<Arc<dyn Repository>>) -> Self {
        Self { repositories }
    }
}

impl Repository for CompositeRepository {
    fn kind(&self) -> RepositoryKind {
        RepositoryKind::Composite
    }

    fn name(&self) -> String {
        let names: Vec<String> = self.repositories.iter().map(|r| r.name()).collect();
        format!("composite({})", names.join(", "))
    }

    fn packages(&self) -> Vec<Arc<PackageRecord>> {
        self.repositories
            .iter()
            .flat_map(|r| r.packages())
            .collect()
    }

    fn has_package(&self, package: &PackageRecord) -> bool {
        self.repositories.iter().any(|r| r.has_package(package))
    }
}
