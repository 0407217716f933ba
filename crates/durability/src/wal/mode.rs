//! Durability modes.
//!
//! Every acknowledged write must be durable, which rules out a
//! write-behind/cache mode entirely — only `Standard` (fsync on
//! checkpoint) and `Always` (fsync every append) are exposed.

use std::time::Duration;

/// Controls when `WalWriter::append` fsyncs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurabilityMode {
    /// Fsync on a timer/batch-size boundary rather than every append.
    Standard {
        interval_ms: u64,
        batch_size: usize,
    },
    /// Fsync after every single append before returning to the caller.
    Always,
}

impl DurabilityMode {
    pub const fn standard_default() -> Self {
        DurabilityMode::Standard {
            interval_ms: 50,
            batch_size: 64,
        }
    }

    pub fn checkpoint_interval(&self) -> Duration {
        match self {
            DurabilityMode::Standard { interval_ms, .. } => Duration::from_millis(*interval_ms),
            DurabilityMode::Always => Duration::from_millis(0),
        }
    }
}

impl Default for DurabilityMode {
    fn default() -> Self {
        Self::standard_default()
    }
}
