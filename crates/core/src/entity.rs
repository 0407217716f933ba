//! The `Entity`: an opaque content blob plus an append-only temporal tag
//! stream.

use crate::dataset::Dataset;
use crate::error::{Error, Result};
use crate::tag::{ReservedNamespace, Tag, TemporalTag};
use crate::types::{EntityId, TimestampNs};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An entity: an id, a temporal stream of tags, and a content blob.
///
/// `tags` preserves insertion order (append-only); `current_tags()` is the
/// derived, collapsed view most callers actually want.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub tags: Vec<TemporalTag>,
    pub content: Vec<u8>,
    pub created_at: TimestampNs,
    pub updated_at: TimestampNs,
}

impl Entity {
    /// Builds a new entity from a tag set and content, stamping every tag
    /// and the cached timestamps with `now`. The caller assigns `id`.
    pub fn new(id: EntityId, tags: Vec<Tag>, content: Vec<u8>, now: TimestampNs) -> Self {
        let tags = tags
            .into_iter()
            .map(|tag| TemporalTag::new(now, tag))
            .collect();
        Entity {
            id,
            tags,
            content,
            created_at: now,
            updated_at: now,
        }
    }

    /// Appends new tags at `now`, refreshing `updated_at` and leaving
    /// `created_at` untouched. Used by lifecycle transitions and `update`.
    pub fn append_tags(&mut self, tags: impl IntoIterator<Item = Tag>, now: TimestampNs) {
        for tag in tags {
            self.tags.push(TemporalTag::new(now, tag));
        }
        self.updated_at = self.updated_at.max(now);
    }

    /// Collapses the temporal tag stream to the live untimestamped set:
    /// the newest tag per `key_prefix`, in no particular order.
    pub fn current_tags(&self) -> Vec<Tag> {
        let mut latest: HashMap<&str, &TemporalTag> = HashMap::new();
        for tt in &self.tags {
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

    /// The live value of a reserved or custom namespace's sole tag, if the
    /// namespace is single-valued (dataset, status). Returns the first
    /// current tag whose namespace matches.
    fn current_tag_in_namespace(&self, namespace: &str) -> Option<&Tag> {
        let mut best: Option<&TemporalTag> = None;
        for tt in &self.tags {
            if tt.tag.namespace() != namespace {
                continue;
            }
            if best.map(|b| tt.timestamp >= b.timestamp).unwrap_or(true) {
                best = Some(tt);
            }
        }
        best.map(|tt| &tt.tag)
    }

    /// The entity's dataset, extracted from its live `dataset:*` tag.
    pub fn dataset(&self) -> Option<Dataset> {
        self.current_tag_in_namespace(ReservedNamespace::DATASET)
            .map(|tag| Dataset::from_tag(tag))
    }

    /// Validates invariants: non-empty id, exactly one live `dataset:*`
    /// tag, at least one live `type:*` tag, and every tag timestamped no
    /// earlier than `created_at`.
    pub fn validate(&self) -> Result<()> {
        if self.id.as_str().trim().is_empty() {
            return Err(Error::InvalidArgument("entity id must not be empty".into()));
        }
        if self.dataset().is_none() {
            return Err(Error::InvalidArgument(
                "entity must carry exactly one live dataset:* tag".into(),
            ));
        }
        if self
            .current_tag_in_namespace(ReservedNamespace::TYPE)
            .is_none()
        {
            return Err(Error::InvalidArgument(
                "entity must carry at least one type:* tag".into(),
            ));
        }
        if let Some(bad) = self.tags.iter().find(|tt| tt.timestamp < self.created_at) {
            return Err(Error::InvalidArgument(format!(
                "tag {bad} timestamped before entity creation"
            )));
        }
        Ok(())
    }
}
