//! Per-dataset index partitioning: a `DashMap` of dataset name to its own
//! sharded tag index, so queries that name a dataset route to exactly
//! one partition's index, and cross-dataset fan-out is an explicit,
//! opt-in "global admin" path rather than the default.

use super::shard::ShardedTagIndex;
use dashmap::DashMap;
use entitydb_core::{Dataset, Error, Result};
use std::path::PathBuf;
use std::sync::Arc;

/// A single dataset's sharded tag index plus its on-disk sidecar path.
pub struct DatasetPartition {
    pub name: Dataset,
    pub index: ShardedTagIndex,
    pub sidecar_path: PathBuf,
    live_entity_count: std::sync::atomic::AtomicUsize,
}

impl DatasetPartition {
    fn new(name: Dataset, shard_count: usize, sidecar_dir: &std::path::Path) -> Self {
        let sidecar_path = sidecar_dir.join(format!("{}.idx", name.as_str()));
        DatasetPartition {
            name,
            index: ShardedTagIndex::new(shard_count),
            sidecar_path,
            live_entity_count: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn mark_entity_added(&self) {
        self.live_entity_count
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn mark_entity_removed(&self) {
        self.live_entity_count
            .fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn is_empty(&self) -> bool {
        self.live_entity_count.load(std::sync::atomic::Ordering::SeqCst) == 0
    }
}

/// Registry of all known dataset partitions, created lazily on first
/// write that carries a new dataset tag.
pub struct DatasetRegistry {
    partitions: DashMap<Dataset, Arc<DatasetPartition>>,
    shard_count: usize,
    sidecar_dir: PathBuf,
}

impl DatasetRegistry {
    pub fn new(shard_count: usize, sidecar_dir: impl Into<PathBuf>) -> Self {
        DatasetRegistry {
            partitions: DashMap::new(),
            shard_count,
            sidecar_dir: sidecar_dir.into(),
        }
    }

    /// Returns the partition for `name`, creating it if this is the first
    /// time it's been seen.
    pub fn get_or_create(&self, name: &Dataset) -> Arc<DatasetPartition> {
        self.partitions
            .entry(name.clone())
            .or_insert_with(|| {
                Arc::new(DatasetPartition::new(
                    name.clone(),
                    self.shard_count,
                    &self.sidecar_dir,
                ))
            })
            .clone()
    }

    pub fn get(&self, name: &Dataset) -> Option<Arc<DatasetPartition>> {
        self.partitions.get(name).map(|e| e.clone())
    }

    pub fn all(&self) -> Vec<Arc<DatasetPartition>> {
        self.partitions.iter().map(|e| e.value().clone()).collect()
    }

    /// Removes a partition's registry entry, refusing while any live
    /// entity still references it.
    pub fn drop_if_empty(&self, name: &Dataset) -> Result<()> {
        let Some(partition) = self.get(name) else {
            return Ok(());
        };
        if !partition.is_empty() {
            return Err(Error::Conflict(format!(
                "dataset {name} still has live entities"
            )));
        }
        self.partitions.remove(name);
        Ok(())
    }
}
