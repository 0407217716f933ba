//! Write-ahead log: record format, durability modes, and the writer/
//! replayer built on top of `entitydb-storage`'s unified file.

pub mod mode;
pub mod record;
pub mod writer;

pub use mode::DurabilityMode;
pub use record::{Lsn, Op, WalRecord};
pub use writer::WalWriter;
