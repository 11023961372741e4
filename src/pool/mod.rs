//! Aggregated package index.
//!
//! A [`Pool`] flattens repositories into one arena of records and indexes
//! every record under its own name and every name it provides or replaces.
//! Records are addressed by [`PackageId`]s that carry the id of the pool
//! that issued them, so an id can never silently resolve in another pool.

use log::debug;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::package::PackageRecord;
use crate::repository::Repository;
use crate::version::{Stability, VersionConstraint};

static NEXT_POOL_ID: AtomicU32 = AtomicU32::new(1);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("Package id {0} does not belong to this pool")]
    UnknownPackageId(PackageId),
}

/// Opaque handle to a record inside one pool instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageId {
    pool: u32,
    index: u32,
}

impl std::fmt::Display for PackageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.pool, self.index)
    }
}

/// A record returned by [`Pool::what_provides`].
#[derive(Debug, Clone)]
pub struct Candidate {
    pub id: PackageId,
    pub package: Arc<PackageRecord>,
    /// Declaration index of the originating repository; lower is preferred.
    pub priority: usize,
}

#[derive(Debug)]
struct Entry {
    package: Arc<PackageRecord>,
    priority: usize,
}

pub struct Pool {
    id: u32,
    minimum_stability: Stability,
    repositories: usize,
    entries: Vec<Entry>,
    by_name: HashMap<String, Vec<u32>>,
}

impl Pool {
    pub fn new() -> Self {
        Self::with_minimum_stability(Stability::Dev)
    }

    /// Pool that skips records less stable than `minimum_stability`.
    pub fn with_minimum_stability(minimum_stability: Stability) -> Self {
        Self {
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            minimum_stability,
            repositories: 0,
            entries: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Index every record of `repository`. Priority is the declaration order.
    pub fn add_repository(&mut self, repository: &dyn Repository) {
        let priority = self.repositories;
        self.repositories += 1;

        let mut added = 0;
        for package in repository.packages() {
            if package.version().stability() < self.minimum_stability {
                continue;
            }

            let index = self.entries.len() as u32;
            let mut names: Vec<&str> = Vec::with_capacity(1 + package.links().len());
            names.push(package.name());
            names.extend(package.provided_names());
            names.sort_unstable();
            names.dedup();
            for name in names {
                self.by_name.entry(name.to_string()).or_default().push(index);
            }

            self.entries.push(Entry {
                package: Arc::clone(&package),
                priority,
            });
            added += 1;
        }

        debug!(
            "Pool {}: indexed {} package(s) from {} repository {}",
            self.id,
            added,
            repository.kind(),
            repository.name()
        );
    }

    /// Every record named, providing or replacing `name` whose version
    /// satisfies `constraint`, in repository declaration order.
    pub fn what_provides(&self, name: &str, constraint: &VersionConstraint) -> Vec<Candidate> {
        let name = name.to_lowercase();
        let Some(indices) = self.by_name.get(&name) else {
            return Vec::new();
        };

        indices
            .iter()
            .filter_map(|&index| {
                let entry = &self.entries[index as usize];
                constraint
                    .matches(entry.package.version())
                    .then(|| Candidate {
                        id: PackageId {
                            pool: self.id,
                            index,
                        },
                        package: Arc::clone(&entry.package),
                        priority: entry.priority,
                    })
            })
            .collect()
    }

    pub fn literal_to_package(&self, id: PackageId) -> Result<&Arc<PackageRecord>, PoolError> {
        self.entry(id).map(|entry| &entry.package)
    }

    pub fn priority(&self, id: PackageId) -> Result<usize, PoolError> {
        self.entry(id).map(|entry| entry.priority)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, id: PackageId) -> Result<&Entry, PoolError> {
        if id.pool != self.id {
            return Err(PoolError::UnknownPackageId(id));
        }
        self.entries
            .get(id.index as usize)
            .ok_or(PoolError::UnknownPackageId(id))
    }
}

impl Default for Pool {
    fn default() -> Self {
        Self::new()
    }
}
