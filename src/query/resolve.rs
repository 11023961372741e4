//! Targeted lookups and listings over materialized repositories.

use anyhow::Result;
use log::{debug, info};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{QueryEntry, QueryResult, Scope};
use crate::policy::DefaultPolicy;
use crate::pool::Pool;
use crate::repository::Repository;
use crate::version::{Stability, VersionConstraint};

/// Index `repositories` in declaration order.
pub fn build_pool(repositories: &[Arc<dyn Repository>], minimum_stability: Stability) -> Pool {
    let mut pool = Pool::with_minimum_stability(minimum_stability);
    for repository in repositories {
        pool.add_repository(repository.as_ref());
    }
    pool
}

/// Resolve one package by name.
///
/// Providers and replacers of `name` are discovered by the pool but never
/// returned. Without a constraint, a candidate contained in `primary` wins
/// (the last one in pool order if there are several); otherwise `policy`
/// chooses. The entry's `versions` lists every candidate literally named
/// `name`.
pub fn find_package(
    primary: &dyn Repository,
    pool: &Pool,
    name: &str,
    constraint: Option<&VersionConstraint>,
    policy: &DefaultPolicy,
) -> Result<QueryResult> {
    let name = name.to_lowercase();
    let any = VersionConstraint::any();
    let candidates = pool.what_provides(&name, constraint.unwrap_or(&any));

    let mut versions = BTreeMap::new();
    let mut ids = Vec::with_capacity(candidates.len());
    let mut installed = None;

    for candidate in candidates {
        if candidate.package.name() != name {
            debug!("Skipping {}: provides or replaces {}", candidate.package, name);
            continue;
        }

        if constraint.is_none() && primary.has_package(&candidate.package) {
            installed = Some(Arc::clone(&candidate.package));
        }

        versions.insert(
            candidate.package.pretty_version().to_string(),
            candidate.package.normalized_version().to_string(),
        );
        ids.push(candidate.id);
    }

    let chosen = match installed {
        Some(package) => {
            info!("Using {} from the {} repository", package, primary.kind());
            Some(package)
        }
        None => match policy.select_preferred(pool, &ids)?.first() {
            Some(&id) => Some(Arc::clone(pool.literal_to_package(id)?)),
            None => None,
        },
    };

    let mut result = QueryResult::new();
    if let Some(package) = chosen {
        debug!("Selected {} out of {} version(s)", package, versions.len());
        result.insert(
            name,
            QueryEntry {
                package: Some(package),
                versions,
            },
        );
    } else {
        debug!("No package named {}", name);
    }
    Ok(result)
}

/// List every package of `repositories`, keeping the highest version of each.
///
/// In the `available` scope, repositories offering name-only listings
/// contribute bare names instead of records.
pub fn list_packages(scope: Scope, repositories: &[Arc<dyn Repository>]) -> QueryResult {
    let mut result = QueryResult::new();

    for repository in repositories {
        if scope == Scope::Available {
            if let Some(names) = repository.provider_names() {
                debug!(
                    "Listing {} name(s) from {} without metadata",
                    names.len(),
                    repository.name()
                );
                for name in names {
                    result.entry(name).or_insert_with(QueryEntry::name_only);
                }
                continue;
            }
        }

        for package in repository.packages() {
            let newer = match result.get(package.name()) {
                Some(QueryEntry {
                    package: Some(kept),
                    ..
                }) => kept.version() < package.version(),
                _ => true,
            };
            if newer {
                result.insert(package.name().to_string(), QueryEntry::single(package));
            }
        }
    }

    result
}
