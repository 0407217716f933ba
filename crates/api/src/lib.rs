//! Thin public-facing facade over `entitydb-engine`: mostly re-exports
//! and thin wrapping rather than its own logic. Restates the repository
//! contract as a trait so callers can depend on it without naming
//! `entitydb_engine::Repository<S>` directly, and re-exports the
//! on-disk format constants and `Config`.

use entitydb_concurrency::CancellationToken;
use entitydb_core::{Config, Entity, EntityId, Error, Page, QueryRequest, Result, Tag, TimestampNs};
use entitydb_engine::repository::{EntityStorage, GetOptions, Repository};

/// On-disk format magic, restated here so API consumers can check a file
/// without reaching into `entitydb-storage` directly.
pub const FORMAT_MAGIC: &str = "EUFF";
pub const FORMAT_VERSION: u32 = 2;

/// Rejects an on-disk version that doesn't match [`FORMAT_VERSION`].
/// There is no migration path shipped: a mismatch is a hard error.
pub fn check_format_version(on_disk_version: u32) -> Result<()> {
    if on_disk_version != FORMAT_VERSION {
        return Err(Error::InvalidArgument(format!(
            "unsupported on-disk format version {on_disk_version}, expected {FORMAT_VERSION}; no migration path is implemented"
        )));
    }
    Ok(())
}

/// The entity repository contract, restated as a trait so callers can
/// depend on it without naming `Repository<S>`'s storage parameter.
/// Implemented by every `entitydb_engine::Repository<S>`.
pub trait EntityRepository {
    fn create(&self, entity: Entity, token: &CancellationToken) -> Result<Entity>;
    fn update(&self, entity: Entity, token: &CancellationToken) -> Result<Entity>;
    fn delete(&self, id: &EntityId, token: &CancellationToken) -> Result<()>;
    fn get_by_id(&self, id: &EntityId, options: GetOptions, token: &CancellationToken) -> Result<Entity>;
    fn list_by_tag(&self, dataset: &entitydb_core::Dataset, tag: &Tag) -> Vec<EntityId>;
    fn query(&self, request: &QueryRequest, global_admin: bool, token: &CancellationToken) -> Result<Page<Entity>>;
    fn as_of(&self, entity: &Entity, t: TimestampNs) -> Vec<Tag>;
}

impl<S: EntityStorage> EntityRepository for Repository<S> {
    fn create(&self, entity: Entity, token: &CancellationToken) -> Result<Entity> {
        Repository::create(self, entity, token)
    }

    fn update(&self, entity: Entity, token: &CancellationToken) -> Result<Entity> {
        Repository::update(self, entity, token)
    }

    fn delete(&self, id: &EntityId, token: &CancellationToken) -> Result<()> {
        Repository::delete(self, id, token)
    }

    fn get_by_id(&self, id: &EntityId, options: GetOptions, token: &CancellationToken) -> Result<Entity> {
        Repository::get_by_id(self, id, options, token)
    }

    fn list_by_tag(&self, dataset: &entitydb_core::Dataset, tag: &Tag) -> Vec<EntityId> {
        Repository::list_by_tag(self, dataset, tag)
    }

    fn query(&self, request: &QueryRequest, global_admin: bool, token: &CancellationToken) -> Result<Page<Entity>> {
        Repository::query(self, request, global_admin, token)
    }

    fn as_of(&self, entity: &Entity, t: TimestampNs) -> Vec<Tag> {
        entitydb_engine::temporal::as_of(entity, t)
    }
}

pub use entitydb_concurrency::CancellationToken;
pub use entitydb_core::{
    Config as EntityDbConfig, Dataset, Entity as EntityDbEntity, EntityId as EntityDbId,
};
pub use entitydb_engine::{Database, GetOptions as EntityGetOptions};

/// Re-exports `Config` under a facade-scoped name too, for callers that
/// want to avoid importing `entitydb_core::Config` directly.
pub type DatabaseConfig = Config;

#[cfg(test)]
mod tests {
    use super::*;
    use entitydb_engine::repository::InMemoryStorage;
    use entitydb_core::{Tag as CoreTag, TimestampNs as CoreTimestampNs};

    fn test_repo() -> Repository<InMemoryStorage> {
        let config = Config::builder("/tmp/entitydb-api-tests").build().unwrap();
        Repository::new(InMemoryStorage::default(), config)
    }

    #[test]
    fn format_version_mismatch_is_rejected() {
        assert!(check_format_version(FORMAT_VERSION).is_ok());
        assert!(check_format_version(FORMAT_VERSION + 1).is_err());
    }

    #[test]
    fn repository_trait_object_round_trips_through_create_and_get() {
        let repo = test_repo();
        let entity = Entity::new(
            EntityId::generate(),
            vec![
                CoreTag::new("dataset:orders").unwrap(),
                CoreTag::new("type:order").unwrap(),
            ],
            vec![],
            CoreTimestampNs::now(),
        );
        let facade: &dyn EntityRepository = &repo;
        let token = CancellationToken::never();
        let created = facade.create(entity, &token).unwrap();
        let fetched = facade.get_by_id(&created.id, GetOptions::full(), &token).unwrap();
        assert_eq!(fetched.id, created.id);
    }
}
