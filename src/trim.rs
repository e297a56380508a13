//! Bounded Store Trimming
//!
//! Keeps a namespace at or under its entry bound by deleting the oldest
//! entries. List-then-delete is deliberately not transactional: writers
//! racing a trim can overshoot the bound by at most the number of
//! in-flight writes, and the next trim corrects it.

use tracing::debug;

use crate::domain::ports::StoreBackend;
use crate::error::Result;

/// Delete the oldest entries of `namespace` until at most `max_entries`
/// remain. Returns the number of entries actually deleted.
///
/// Idempotent: a second call right after the first deletes nothing. An
/// entry deleted by a concurrent task between the listing and the delete
/// is skipped silently.
pub async fn trim_to_bound(
    store: &dyn StoreBackend,
    namespace: &str,
    max_entries: usize,
) -> Result<usize> {
    let keys = store.keys(namespace).await?;
    if keys.len() <= max_entries {
        return Ok(0);
    }

    let overflow = keys.len() - max_entries;
    let mut evicted = 0;
    for key in keys.iter().take(overflow) {
        if store.delete(namespace, key).await? {
            evicted += 1;
        }
    }

    if evicted > 0 {
        debug!(
            namespace = %namespace,
            evicted,
            bound = max_entries,
            "trimmed namespace to bound"
        );
    }
    Ok(evicted)
}

// =============================================================================
// Tests
// =============================================================================
