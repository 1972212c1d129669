//! Structural deduplication.
//!
//! [`drop_duplicates`] removes rows that are identical in every column.
//! Rows that survive it can still share an identity while differing
//! elsewhere; [`resolve_identity_conflicts`] enforces one row per identity
//! so the store's primary keys are never violated.

use indexmap::{IndexMap, IndexSet};
use std::hash::Hash;
use tracing::{debug, warn};

use crate::config::IdentityConflictPolicy;
use crate::entity::Entity;
use crate::error::{EtlError, Result};

/// Rows left after a dedup pass and how many were removed.
#[derive(Debug, Clone, PartialEq)]
pub struct Deduplicated<T> {
    pub rows: Vec<T>,
    pub removed: usize,
}

/// Remove exact duplicate rows, keeping the first occurrence of each.
pub fn drop_duplicates<T: Eq + Hash>(rows: Vec<T>) -> Deduplicated<T> {
    let before = rows.len();
    let unique: IndexSet<T> = rows.into_iter().collect();
    let removed = before - unique.len();

    Deduplicated {
        rows: unique.into_iter().collect(),
        removed,
    }
}

/// Keep one row per identity key according to `policy`.
pub fn resolve_identity_conflicts<T: Entity>(
    rows: Vec<T>,
    policy: IdentityConflictPolicy,
) -> Result<Deduplicated<T>> {
    let before = rows.len();
    let mut by_key: IndexMap<T::Key, T> = IndexMap::with_capacity(before);
    let mut first_conflict = None;

    for row in rows {
        let key = row.key();
        if by_key.contains_key(&key) {
            first_conflict.get_or_insert(key);
            continue;
        }
        by_key.insert(key, row);
    }

    let removed = before - by_key.len();
    if let Some(key) = first_conflict {
        if policy == IdentityConflictPolicy::Abort {
            return Err(EtlError::IdentityConflict {
                entity: T::NAME,
                count: removed,
                sample: format!("{:?}", key),
            });
        }
        warn!(
            entity = T::NAME,
            dropped = removed,
            first_key = ?key,
            "Rows sharing an identity with a different earlier row were dropped"
        );
    }

    Ok(Deduplicated {
        rows: by_key.into_values().collect(),
        removed,
    })
}

/// Full-row dedup followed by identity enforcement.
///
/// Returns the surviving rows, the exact duplicates removed and the
/// identity conflicts removed.
pub fn deduplicate<T: Entity>(
    rows: Vec<T>,
    policy: IdentityConflictPolicy,
) -> Result<(Vec<T>, usize, usize)> {
    let exact = drop_duplicates(rows);
    if exact.removed > 0 {
        debug!(entity = T::NAME, removed = exact.removed, "Dropped exact duplicate rows");
    }
    let resolved = resolve_identity_conflicts(exact.rows, policy)?;
    Ok((resolved.rows, exact.removed, resolved.removed))
}
