//! The entity engine: repository, temporal queries, lifecycle
//! transitions, background maintenance, and the `Database` facade that
//! ties them together.

pub mod background;
pub mod database;
pub mod lifecycle;
pub mod repository;
pub mod temporal;

pub use background::{BackgroundWorkers, MaintenanceTask};
pub use database::Database;
pub use repository::{EntityStorage, GetOptions, InMemoryStorage, Repository, UnifiedStorage};
pub use temporal::Diff;
