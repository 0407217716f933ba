//! Core data model for EntityDB: entities, tags, datasets, lifecycle
//! states, configuration, and the error type shared by every other crate
//! in the workspace.

pub mod config;
pub mod dataset;
pub mod entity;
pub mod error;
pub mod lifecycle;
pub mod query;
pub mod tag;
pub mod types;

pub use config::{Config, ConfigBuilder};
pub use dataset::Dataset;
pub use entity::Entity;
pub use error::{Error, Result};
pub use lifecycle::LifecycleState;
pub use query::{Page, QueryRequest, SortKey};
pub use tag::{ReservedNamespace, Tag, TemporalTag};
pub use types::{EntityId, TimestampNs};
