//! Temporal queries over an entity's tag stream: as-of snapshots,
//! history, cross-entity changes, and diffs.
//!
//! Built directly from the entity's own tag stream, expressed the way
//! the rest of the engine crate expresses algorithms: plain functions
//! returning `Result`, `tracing::debug!` at the entry of the two O(n)
//! scans.

use entitydb_core::{Entity, Error, Result, Tag, TemporalTag, TimestampNs};
use std::collections::{HashMap, HashSet};

/// The live tag set as of `t`: within each `key_prefix` group, the
/// newest tag timestamped no later than `t`.
pub fn as_of(entity: &Entity, t: TimestampNs) -> Vec<Tag> {
    tracing::debug!(entity_id = %entity.id, t = %t, "as_of scan");
    let mut latest: HashMap<&str, &TemporalTag> = HashMap::new();
    for tt in &entity.tags {
        if tt.timestamp > t {
            continue;
        }
        latest
            .entry(tt.tag.key_prefix())
            .and_modify(|existing| {
                if tt.timestamp >= existing.timestamp {
                    *existing = tt;
                }
            })
            .or_insert(tt);
    }
    latest.into_values().map(|tt| tt.tag.clone()).collect()
}

/// Every tag timestamped within `[from, to]` (either bound optional),
/// chronologically ordered.
pub fn history(
    entity: &Entity,
    from: Option<TimestampNs>,
    to: Option<TimestampNs>,
) -> Vec<(TimestampNs, Tag)> {
    tracing::debug!(entity_id = %entity.id, "history scan");
    let mut out: Vec<(TimestampNs, Tag)> = entity
        .tags
        .iter()
        .filter(|tt| from.map(|f| tt.timestamp >= f).unwrap_or(true))
        .filter(|tt| to.map(|t| tt.timestamp <= t).unwrap_or(true))
        .map(|tt| (tt.timestamp, tt.tag.clone()))
        .collect();
    out.sort_by_key(|(ts, _)| *ts);
    out
}

/// Every loaded entity whose `updated_at` is newer than `since`, sorted
/// by the max timestamp of their tags newer than `since` (causal order).
pub fn changes<'a>(entities: impl Iterator<Item = &'a Entity>, since: TimestampNs) -> Vec<&'a Entity> {
    let mut changed: Vec<&Entity> = entities.filter(|e| e.updated_at > since).collect();
    changed.sort_by_key(|e| {
        e.tags
            .iter()
            .filter(|tt| tt.timestamp > since)
            .map(|tt| tt.timestamp)
            .max()
            .unwrap_or(e.updated_at)
    });
    changed
}

/// The set of tags added and removed between the as-of snapshots at
/// `t1` and `t2`. `t1` must not be later than `t2`.
#[derive(Debug, Clone, Default)]
pub struct Diff {
    pub added: HashSet<Tag>,
    pub removed: HashSet<Tag>,
}

pub fn diff(entity: &Entity, t1: TimestampNs, t2: TimestampNs) -> Result<Diff> {
    if t1 > t2 {
        return Err(Error::InvalidArgument(format!(
            "diff requires t1 <= t2, got t1={t1} t2={t2}"
        )));
    }
    let before: HashSet<Tag> = as_of(entity, t1).into_iter().collect();
    let after: HashSet<Tag> = as_of(entity, t2).into_iter().collect();
    Ok(Diff {
        added: after.difference(&before).cloned().collect(),
        removed: before.difference(&after).cloned().collect(),
    })
}
