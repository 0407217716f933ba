//! In-memory tag indices: a hash-sharded multimap per dataset partition.

pub mod dataset;
pub mod shard;

pub use dataset::{DatasetPartition, DatasetRegistry};
pub use shard::ShardedTagIndex;
