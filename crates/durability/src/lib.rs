//! Write-ahead logging, checksums, and crash recovery for EntityDB's
//! unified file.

pub mod checksum;
pub mod recovery;
pub mod wal;

pub use recovery::{recover_entity, RecoveryOutcome};
pub use wal::{DurabilityMode, Lsn, Op, WalRecord, WalWriter};
