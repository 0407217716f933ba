//! Cancellation, write admission control, and multi-entity transaction
//! staging.
//!
//! Locking discipline (enforced by construction in `entitydb-engine`, not
//! by a runtime check here): shard lock(s) before the entity-map guard
//! before any I/O. No code path in this workspace is given a way to
//! acquire them out of order.

pub mod backpressure;
pub mod cancellation;
pub mod transaction_log;

pub use backpressure::AdmissionController;
pub use cancellation::{CancellationToken, Cancelled};
pub use transaction_log::TransactionLog;
