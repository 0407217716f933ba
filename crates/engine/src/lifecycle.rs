//! Lifecycle transitions: soft-delete, undelete, archive, and purge.
//!
//! Ground: `entitydb_core::LifecycleState::can_transition_to` supplies the
//! allowed edges; this module is the write path that appends the tags
//! recording each transition and enforces the edge check before calling
//! into `Repository`.

use crate::repository::{EntityStorage, GetOptions, Repository};
use entitydb_concurrency::CancellationToken;
use entitydb_core::{Entity, EntityId, Error, LifecycleState, Result, Tag, TimestampNs};

/// Soft-deletes an entity: appends `status:soft_deleted` plus the
/// `deleted:*` audit tags and a `lifecycle:transition:*` record. The
/// entity stays in the index and map; it's filtered out at the query
/// layer by the caller when `include_soft_deleted` isn't requested.
pub fn soft_delete<S: EntityStorage>(
    repo: &Repository<S>,
    id: &EntityId,
    user_id: &str,
    reason: &str,
    policy: &str,
    token: &CancellationToken,
) -> Result<Entity> {
    transition(
        repo,
        id,
        LifecycleState::SoftDeleted,
        vec![
            Tag::new("status:soft_deleted")?,
            Tag::new(format!("deleted:by:{user_id}"))?,
            Tag::new(format!("deleted:reason:{reason}"))?,
            Tag::new(format!("deleted:policy:{policy}"))?,
        ],
        token,
    )
}

/// Reverses a soft-delete: appends `status:active`. Only legal from
/// `SoftDeleted`.
pub fn undelete<S: EntityStorage>(
    repo: &Repository<S>,
    id: &EntityId,
    token: &CancellationToken,
) -> Result<Entity> {
    transition(repo, id, LifecycleState::Active, vec![Tag::new("status:active")?], token)
}

/// Archives an entity: appends `status:archived`. Legal from `Active` or
/// `SoftDeleted`; irreversible (no edge back to `Active`).
pub fn archive<S: EntityStorage>(
    repo: &Repository<S>,
    id: &EntityId,
    token: &CancellationToken,
) -> Result<Entity> {
    transition(repo, id, LifecycleState::Archived, vec![Tag::new("status:archived")?], token)
}

/// Permanently removes an entity. This is not a tag transition: `Purged`
/// is reached only through outright deletion, so this delegates straight
/// to `Repository::delete`.
pub fn purge<S: EntityStorage>(repo: &Repository<S>, id: &EntityId, token: &CancellationToken) -> Result<()> {
    repo.delete(id, token)
}

fn transition<S: EntityStorage>(
    repo: &Repository<S>,
    id: &EntityId,
    to: LifecycleState,
    mut new_tags: Vec<Tag>,
    token: &CancellationToken,
) -> Result<Entity> {
    let current = repo.get_by_id(id, GetOptions::full(), token)?;
    let from = LifecycleState::of(&current);
    if !from.can_transition_to(to) {
        return Err(Error::Conflict(format!(
            "lifecycle transition {from:?} -> {to:?} is not permitted"
        )));
    }

    let now = TimestampNs::now();
    let mut updated = current;
    new_tags.push(Tag::new(format!(
        "lifecycle:transition:{from:?}->{to:?}@{now}:{}",
        caller_id(&new_tags)
    ))?);
    updated.append_tags(new_tags, now);
    repo.update(updated, token)
}

/// Pulls the `deleted:by:<user_id>` tag (if present in this batch) back
/// out so the transition-record tag can embed the same user id, rather
/// than threading a separate parameter through every call site.
fn caller_id(tags: &[Tag]) -> String {
    tags.iter()
        .find_map(|t| t.as_str().strip_prefix("deleted:by:").map(str::to_string))
        .unwrap_or_else(|| "system".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryStorage;
    use entitydb_core::{Config, Tag};

    fn test_repo() -> Repository<InMemoryStorage> {
        let config = Config::builder("/tmp/entitydb-lifecycle-tests").build().unwrap();
        Repository::new(InMemoryStorage::default(), config)
    }

    fn token() -> CancellationToken {
        CancellationToken::never()
    }

    fn order_entity() -> Entity {
        Entity::new(
            EntityId::generate(),
            vec![
                Tag::new("dataset:orders").unwrap(),
                Tag::new("type:order").unwrap(),
            ],
            vec![],
            TimestampNs::now(),
        )
    }

    #[test]
    fn soft_delete_then_undelete_roundtrips() {
        let repo = test_repo();
        let created = repo.create(order_entity(), &token()).unwrap();
        let deleted = soft_delete(&repo, &created.id, "alice", "test", "manual", &token()).unwrap();
        assert_eq!(LifecycleState::of(&deleted), LifecycleState::SoftDeleted);
        let restored = undelete(&repo, &created.id, &token()).unwrap();
        assert_eq!(LifecycleState::of(&restored), LifecycleState::Active);
    }

    #[test]
    fn archive_is_irreversible() {
        let repo = test_repo();
        let created = repo.create(order_entity(), &token()).unwrap();
        archive(&repo, &created.id, &token()).unwrap();
        assert!(undelete(&repo, &created.id, &token()).is_err());
    }

    #[test]
    fn purge_removes_entity_entirely() {
        let repo = test_repo();
        let created = repo.create(order_entity(), &token()).unwrap();
        purge(&repo, &created.id, &token()).unwrap();
        assert!(repo.get_by_id(&created.id, GetOptions::default(), &token()).is_err());
    }
}
