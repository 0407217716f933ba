//! Lifecycle state derived from an entity's tags.

use crate::entity::Entity;
use crate::tag::ReservedNamespace;
use serde::{Deserialize, Serialize};

/// An entity's lifecycle state.
///
/// `Active`, `SoftDeleted`, and `Archived` are derived from the live
/// `status:*` tag. `Purged` is never tag-derived: it's a repository-level
/// tombstone state reached only via [`crate::error::Error`]-free deletion,
/// after which the entity no longer exists in the in-memory map or index
/// and is reachable only through WAL replay or a compaction backup during
/// recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    Active,
    SoftDeleted,
    Archived,
    Purged,
}

impl LifecycleState {
    /// Derives the lifecycle state from an entity's current tags.
    pub fn of(entity: &Entity) -> Self {
        let status = entity
            .current_tags()
            .into_iter()
            .find(|t| t.namespace() == ReservedNamespace::STATUS);
        match status.as_ref().map(|t| t.as_str()) {
            Some("status:soft_deleted") => LifecycleState::SoftDeleted,
            Some("status:archived") => LifecycleState::Archived,
            _ => LifecycleState::Active,
        }
    }

    /// Whether transitioning from `self` to `to` is a permitted edge.
    ///
    /// `Purged` is reached only via outright deletion (`Repository::delete`,
    /// which doesn't go through this state machine at all), so no edge here
    /// targets it; `Archived -> Active` is likewise disallowed.
    pub fn can_transition_to(self, to: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, to),
            (Active, SoftDeleted)
                | (SoftDeleted, Active)
                | (SoftDeleted, Archived)
                | (Active, Archived)
        )
    }
}
