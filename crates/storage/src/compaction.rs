//! Compaction policy: when a unified file has accumulated enough
//! tombstoned space to be worth reclaiming.

use crate::format::entity_index::EntityIndexEntry;

/// A simple ratio-based trigger: compact once tombstoned entries make up
/// more than `threshold` of the index. The caller (`entitydb-engine`'s
/// background worker) decides when to actually check this and invoke
/// `Writer::compact`.
pub fn should_compact(index: &[EntityIndexEntry], threshold: f64) -> bool {
    if index.is_empty() {
        return false;
    }
    let purged = index.iter().filter(|e| e.is_purged()).count();
    (purged as f64) / (index.len() as f64) >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use entitydb_core::EntityId;

    fn entry(purged: bool) -> EntityIndexEntry {
        EntityIndexEntry {
            entity_id: EntityId::generate(),
            offset: 0,
            size: 0,
            flags: if purged { 1 } else { 0 },
        }
    }

    #[test]
    fn triggers_once_ratio_exceeded() {
        let index = vec![entry(true), entry(true), entry(false)];
        assert!(should_compact(&index, 0.5));
        assert!(!should_compact(&index, 0.9));
    }

    #[test]
    fn empty_index_never_compacts() {
        assert!(!should_compact(&[], 0.0));
    }
}
