//! Preference among candidate packages.

use std::cmp::Ordering;

use crate::pool::{PackageId, Pool, PoolError};

/// Orders candidates by version, then repository priority, then pool id.
///
/// `prefer_stable` ranks stability before version; `prefer_lowest` turns the
/// version order around.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DefaultPolicy {
    pub prefer_stable: bool,
    pub prefer_lowest: bool,
}

impl DefaultPolicy {
    pub fn new(prefer_stable: bool, prefer_lowest: bool) -> Self {
        Self {
            prefer_stable,
            prefer_lowest,
        }
    }

    /// Sort `candidates` from most to least preferred.
    ///
    /// Fails if any id was issued by another pool.
    pub fn select_preferred(
        &self,
        pool: &Pool,
        candidates: &[PackageId],
    ) -> Result<Vec<PackageId>, PoolError> {
        let mut ranked = candidates
            .iter()
            .map(|&id| {
                let package = pool.literal_to_package(id)?;
                Ok((id, package, pool.priority(id)?))
            })
            .collect::<Result<Vec<_>, PoolError>>()?;

        ranked.sort_by(|(a_id, a, a_priority), (b_id, b, b_priority)| {
            let stability = if self.prefer_stable {
                b.version().stability().cmp(&a.version().stability())
            } else {
                Ordering::Equal
            };
            let version = if self.prefer_lowest {
                a.version().cmp(b.version())
            } else {
                b.version().cmp(a.version())
            };
            stability
                .then(version)
                .then(a_priority.cmp(b_priority))
                .then(a_id.cmp(b_id))
        });

        Ok(ranked.into_iter().map(|(id, _, _)| id).collect())
    }
}
