//! # EntityDB
//!
//! An embedded, single-node temporal database of tagged entities: every
//! entity is an id, an append-only stream of timestamped tags, and an
//! optional content blob. Queries are tag predicates scoped to a dataset;
//! history is queried as-of any past instant rather than overwritten.
//!
//! # Quick start
//!
//! ```no_run
//! use entitydb::{CancellationToken, Config, Database, Entity, EntityId, Tag, TimestampNs};
//!
//! fn main() -> entitydb::Result<()> {
//!     let config = Config::builder("./my-data").build()?;
//!     let db = Database::open(config)?;
//!     let token = CancellationToken::never();
//!
//!     let entity = Entity::new(
//!         EntityId::generate(),
//!         vec![Tag::new("dataset:default")?, Tag::new("type:note")?],
//!         b"hello".to_vec(),
//!         TimestampNs::now(),
//!     );
//!     let created = db.create(entity, &token)?;
//!     let fetched = db.get(&created.id, Default::default(), &token)?;
//!     assert_eq!(fetched.id, created.id);
//!     db.close();
//!     Ok(())
//! }
//! ```
//!
//! Internal crates (storage, durability, concurrency, engine) are not
//! exposed directly; this crate re-exports the stable surface from
//! `entitydb-api`.

pub use entitydb_api::*;
pub use entitydb_core::{
    Config, Entity, EntityId, Error, LifecycleState, Page, QueryRequest, Result, SortKey, Tag,
    TemporalTag, TimestampNs,
};
