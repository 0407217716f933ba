//! A hash-sharded, in-memory multimap from tag to the set of entities
//! currently carrying it: `N` independent `parking_lot::RwLock`-guarded
//! `FxHashMap`s selected by hash, so lookups and updates on different
//! tag-hash shards never contend.

use entitydb_core::{EntityId, Tag};
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHasher};
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

/// Sharded tag -> entity-id-set index.
///
/// Only the untimestamped form of a tag ever enters the index; the
/// temporal timestamp lives solely in the entity's own tag stream, so
/// `as_of` queries bypass this index entirely and scan `Entity::tags`
/// directly.
pub struct ShardedTagIndex {
    shards: Vec<RwLock<FxHashMap<Tag, HashSet<EntityId>>>>,
}

impl ShardedTagIndex {
    /// `shard_count` must be a power of two (enforced by
    /// `entitydb_core::Config::validate`).
    pub fn new(shard_count: usize) -> Self {
        let mut shards = Vec::with_capacity(shard_count);
        for _ in 0..shard_count {
            shards.push(RwLock::new(FxHashMap::default()));
        }
        ShardedTagIndex { shards }
    }

    fn shard_for(&self, tag: &Tag) -> usize {
        let mut hasher = FxHasher::default();
        tag.as_str().hash(&mut hasher);
        (hasher.finish() as usize) & (self.shards.len() - 1)
    }

    pub fn add(&self, tag: &Tag, id: EntityId) {
        let shard = &self.shards[self.shard_for(tag)];
        shard.write().entry(tag.clone()).or_default().insert(id);
    }

    pub fn remove(&self, tag: &Tag, id: EntityId) {
        let shard = &self.shards[self.shard_for(tag)];
        let mut guard = shard.write();
        if let Some(set) = guard.get_mut(tag) {
            set.remove(&id);
            if set.is_empty() {
                guard.remove(tag);
            }
        }
    }

    pub fn list_by_tag(&self, tag: &Tag) -> Vec<EntityId> {
        let shard = &self.shards[self.shard_for(tag)];
        shard
            .read()
            .get(tag)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Intersects (`match_all = true`) or unions (`false`) the id sets of
    /// each tag in `tags`.
    pub fn list_by_tags(&self, tags: &[Tag], match_all: bool) -> HashSet<EntityId> {
        let mut sets = tags.iter().map(|t| self.list_by_tag(t));
        let Some(first) = sets.next() else {
            return HashSet::new();
        };
        let mut acc: HashSet<EntityId> = first.into_iter().collect();
        for set in sets {
            let set: HashSet<EntityId> = set.into_iter().collect();
            if match_all {
                acc = acc.intersection(&set).copied().collect();
            } else {
                acc.extend(set);
            }
        }
        acc
    }

    /// Rebuilds the entire index from scratch, discarding all existing
    /// entries. Used by the admin `repair_indexes` operation.
    pub fn rebuild<'a>(&self, entries: impl Iterator<Item = (&'a Tag, EntityId)>) {
        for shard in &self.shards {
            shard.write().clear();
        }
        for (tag, id) in entries {
            self.add(tag, id);
        }
    }
}
