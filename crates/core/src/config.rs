//! Engine configuration, built through a `Config::builder` validating
//! builder rather than constructed directly.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_CHUNK_THRESHOLD_BYTES: u64 = 4 * 1024 * 1024;
const DEFAULT_WAL_CHECKPOINT_BYTES: u64 = 64 * 1024 * 1024;
const DEFAULT_WAL_CHECKPOINT_INTERVAL: Duration = Duration::from_secs(5 * 60);
const DEFAULT_READER_POOL_SIZE: usize = 32;
const DEFAULT_SHARD_COUNT: usize = 256;
const DEFAULT_DATABASE_FILENAME: &str = "entities.db";

/// Per-lifecycle-policy retention window, keyed by the policy name passed
/// to `lifecycle::soft_delete`/`archive`.
pub type LifecycleRetention = HashMap<String, Duration>;

/// Validated engine configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_path: PathBuf,
    pub database_filename: String,
    pub chunk_threshold_bytes: u64,
    pub wal_checkpoint_bytes: u64,
    pub wal_checkpoint_interval: Duration,
    pub reader_pool_size: usize,
    pub shard_count: usize,
    pub lifecycle_retention: LifecycleRetention,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_path: PathBuf::from("."),
            database_filename: DEFAULT_DATABASE_FILENAME.to_string(),
            chunk_threshold_bytes: DEFAULT_CHUNK_THRESHOLD_BYTES,
            wal_checkpoint_bytes: DEFAULT_WAL_CHECKPOINT_BYTES,
            wal_checkpoint_interval: DEFAULT_WAL_CHECKPOINT_INTERVAL,
            reader_pool_size: DEFAULT_READER_POOL_SIZE,
            shard_count: DEFAULT_SHARD_COUNT,
            lifecycle_retention: HashMap::new(),
        }
    }
}

impl Config {
    /// Starts a builder seeded with defaults and the given data directory.
    pub fn builder(data_path: impl Into<PathBuf>) -> ConfigBuilder {
        ConfigBuilder {
            config: Config {
                data_path: data_path.into(),
                ..Config::default()
            },
        }
    }

    /// The full path to the unified `.edb` file.
    pub fn database_path(&self) -> PathBuf {
        self.data_path.join(&self.database_filename)
    }

    /// Validates cross-field invariants not enforced by individual setters.
    pub fn validate(&self) -> Result<()> {
        if !self.shard_count.is_power_of_two() {
            return Err(Error::InvalidArgument(format!(
                "shard_count must be a power of two, got {}",
                self.shard_count
            )));
        }
        if self.chunk_threshold_bytes == 0 {
            return Err(Error::InvalidArgument(
                "chunk_threshold_bytes must be non-zero".into(),
            ));
        }
        if self.reader_pool_size == 0 {
            return Err(Error::InvalidArgument(
                "reader_pool_size must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`Config`], validating each setter where the invariant is
/// local to that field.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn database_filename(mut self, name: impl Into<String>) -> Self {
        self.config.database_filename = name.into();
        self
    }

    pub fn chunk_threshold_bytes(mut self, bytes: u64) -> Self {
        self.config.chunk_threshold_bytes = bytes;
        self
    }

    pub fn wal_checkpoint_bytes(mut self, bytes: u64) -> Self {
        self.config.wal_checkpoint_bytes = bytes;
        self
    }

    pub fn wal_checkpoint_interval(mut self, interval: Duration) -> Self {
        self.config.wal_checkpoint_interval = interval;
        self
    }

    pub fn reader_pool_size(mut self, size: usize) -> Self {
        self.config.reader_pool_size = size;
        self
    }

    pub fn shard_count(mut self, count: usize) -> Self {
        self.config.shard_count = count;
        self
    }

    pub fn lifecycle_retention(mut self, policy: impl Into<String>, window: Duration) -> Self {
        self.config.lifecycle_retention.insert(policy.into(), window);
        self
    }

    /// Validates and finalizes the configuration.
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
