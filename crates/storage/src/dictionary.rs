//! The tag dictionary: an in-memory bidirectional mapping between the
//! timestamped wire form of a tag (`"<ns>|<tag>"`) and a dense `u32` id.
//!
//! Backed by an `FxHashMap` (fast non-cryptographic hashing for a hot,
//! small-dense-integer-key interning path). IDs are monotonically
//! allocated; concurrent writers racing to intern the same wire string
//! both resolve to whichever id was inserted first (the loser's own
//! allocation is discarded, never published).

use entitydb_core::{TemporalTag, Result};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU32, Ordering};

/// Bidirectional tag-string <-> id table.
pub struct TagDictionary {
    forward: RwLock<FxHashMap<String, u32>>,
    reverse: RwLock<Vec<String>>,
    next_id: AtomicU32,
}

impl TagDictionary {
    pub fn new() -> Self {
        TagDictionary {
            forward: RwLock::new(FxHashMap::default()),
            reverse: RwLock::new(Vec::new()),
            next_id: AtomicU32::new(0),
        }
    }

    /// Interns a temporal tag's wire form, returning its id. Concurrent
    /// interning of the same wire string converges on one id: the
    /// allocation made under the write lock that inserts first wins, and
    /// any id allocated but not inserted by a losing racer is simply
    /// dropped (ids need not be contiguous).
    pub fn intern(&self, tag: &TemporalTag) -> u32 {
        let wire = tag.to_string();
        if let Some(id) = self.forward.read().get(&wire) {
            return *id;
        }
        let mut forward = self.forward.write();
        if let Some(id) = forward.get(&wire) {
            return *id;
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        forward.insert(wire.clone(), id);
        let mut reverse = self.reverse.write();
        let idx = id as usize;
        if reverse.len() <= idx {
            reverse.resize(idx + 1, String::new());
        }
        reverse[idx] = wire;
        id
    }

    /// Resolves an id back to its temporal tag's wire form.
    pub fn resolve(&self, id: u32) -> Option<String> {
        self.reverse.read().get(id as usize).cloned().filter(|s| !s.is_empty())
    }

    /// Resolves an id directly to a parsed `TemporalTag`.
    pub fn resolve_tag(&self, id: u32) -> Result<Option<TemporalTag>> {
        match self.resolve(id) {
            Some(wire) => Ok(Some(wire.parse()?)),
            None => Ok(None),
        }
    }

    /// Snapshot of every interned `(id, wire)` pair, for serialization into
    /// the dictionary section.
    pub fn entries(&self) -> Vec<(u32, String)> {
        self.reverse
            .read()
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.is_empty())
            .map(|(id, s)| (id as u32, s.clone()))
            .collect()
    }

    /// Rebuilds a dictionary from a flat `(id, wire)` list, e.g. after
    /// reading the dictionary section off disk, or after compaction
    /// produces a fresh, gap-free dictionary.
    pub fn from_entries(entries: Vec<(u32, String)>) -> Self {
        let dict = TagDictionary::new();
        let max_id = entries.iter().map(|(id, _)| *id).max().unwrap_or(0);
        {
            let mut reverse = dict.reverse.write();
            reverse.resize(max_id as usize + 1, String::new());
            let mut forward = dict.forward.write();
            for (id, wire) in entries {
                reverse[id as usize] = wire.clone();
                forward.insert(wire, id);
            }
        }
        dict.next_id.store(max_id + 1, Ordering::SeqCst);
        dict
    }

    pub fn len(&self) -> usize {
        self.forward.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TagDictionary {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entitydb_core::{Tag, TimestampNs};

    fn tt(ns: u64, tag: &str) -> TemporalTag {
        TemporalTag::new(TimestampNs(ns), Tag::new(tag.to_string()).unwrap())
    }

    #[test]
    fn interning_same_tag_twice_returns_same_id() {
        let dict = TagDictionary::new();
        let a = dict.intern(&tt(1, "type:order"));
        let b = dict.intern(&tt(1, "type:order"));
        assert_eq!(a, b);
        assert_eq!(dict.len(), 1);
    }

    #[test]
    fn resolve_roundtrips() {
        let dict = TagDictionary::new();
        let id = dict.intern(&tt(5, "dataset:orders"));
        let resolved = dict.resolve_tag(id).unwrap().unwrap();
        assert_eq!(resolved.timestamp, TimestampNs(5));
        assert_eq!(resolved.tag.as_str(), "dataset:orders");
    }

    #[test]
    fn from_entries_rebuilds_and_continues_allocating() {
        let dict = TagDictionary::new();
        let id0 = dict.intern(&tt(1, "type:order"));
        let entries = dict.entries();
        let rebuilt = TagDictionary::from_entries(entries);
        assert_eq!(rebuilt.resolve(id0).unwrap(), tt(1, "type:order").to_string());
        let new_id = rebuilt.intern(&tt(2, "type:invoice"));
        assert_ne!(new_id, id0);
    }
}
