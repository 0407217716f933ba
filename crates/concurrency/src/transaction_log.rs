//! In-memory staging for multi-entity writes (a content-chunked create
//! spans a parent entity plus N chunk entities).
//!
//! Only the single-entity WAL append is crash-durable; this log exists so
//! a chunked write can be built up and validated entirely in memory
//! before any of its entities reach the WAL, and discarded with no
//! on-disk trace if aborted before the first append.

use entitydb_core::Entity;

/// A staged, not-yet-committed batch of entity writes.
#[derive(Debug, Default)]
pub struct TransactionLog {
    staged: Vec<Entity>,
}

impl TransactionLog {
    pub fn new() -> Self {
        TransactionLog { staged: Vec::new() }
    }

    /// Stages one entity write. Does not touch the WAL or any index.
    pub fn stage(&mut self, entity: Entity) {
        self.staged.push(entity);
    }

    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Discards every staged entity. Since nothing was ever written to
    /// the WAL, this leaves no trace.
    pub fn abort(self) {}

    /// Consumes the log, handing its staged entities to the caller
    /// (`entitydb-engine::Repository`) to commit one at a time to the
    /// WAL.
    pub fn into_staged(self) -> Vec<Entity> {
        self.staged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entitydb_core::{EntityId, Tag, TimestampNs};

    fn entity() -> Entity {
        Entity::new(
            EntityId::generate(),
            vec![
                Tag::new("dataset:orders").unwrap(),
                Tag::new("type:content_chunk").unwrap(),
            ],
            vec![],
            TimestampNs(1),
        )
    }

    #[test]
    fn staging_accumulates_without_touching_durability() {
        let mut log = TransactionLog::new();
        log.stage(entity());
        log.stage(entity());
        assert_eq!(log.len(), 2);
        let staged = log.into_staged();
        assert_eq!(staged.len(), 2);
    }

    #[test]
    fn abort_leaves_nothing_behind() {
        let mut log = TransactionLog::new();
        log.stage(entity());
        log.abort();
    }
}
