//! Error types for EntityDB
//!
//! `Error` is the single error type returned by every layer of the core:
//! storage, durability, concurrency, engine, and api. We use `thiserror`
//! for the `Display`/`std::error::Error` boilerplate, the way the rest of
//! the stack derives it.
//!
//! ## Error kinds
//!
//! Each variant corresponds to one of the `ErrorKind`s of the design:
//! `InvalidArgument`, `NotFound`, `Conflict`, `WriteFailed`,
//! `ChecksumMismatch`, `Unrecoverable`, `BackpressureTimeout`. A
//! `PermissionDenied` variant exists too: the core never raises it itself,
//! but the RBAC collaborator that sits on top of the repository needs a
//! variant of *this* error type to surface through the same `Result`.

use std::io;
use thiserror::Error;

/// Result type alias used throughout EntityDB.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for all EntityDB operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed tag, missing dataset tag, bad temporal timestamp ordering, etc.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Entity not found in memory or on disk.
    #[error("entity not found: {0}")]
    NotFound(String),

    /// Lifecycle transition not permitted by the state machine.
    #[error("conflict: {0}")]
    Conflict(String),

    /// WAL append or data write failed; the operation was fully rolled back.
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// An entity failed checksum verification on read.
    #[error("checksum mismatch for entity {entity_id}")]
    ChecksumMismatch {
        /// The entity whose stored checksum didn't match its content.
        entity_id: String,
    },

    /// Recovery exhausted (WAL replay and backup restore both failed);
    /// the entity is quarantined.
    #[error("entity {entity_id} is unrecoverable and has been quarantined")]
    Unrecoverable {
        /// The quarantined entity.
        entity_id: String,
    },

    /// A write waited past its cancellation deadline under WAL backpressure.
    #[error("write backpressure timeout: {0}")]
    BackpressureTimeout(String),

    /// Surfaced only by the RBAC collaborator; never raised by the core.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// I/O error reading or writing the unified file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Binary (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Header or section corruption that isn't a checksum mismatch
    /// (bad magic, truncated section, inconsistent offsets).
    #[error("corrupt file: {0}")]
    CorruptHeader(String),
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl Error {
    /// Whether a caller could reasonably retry this error (e.g. after
    /// waiting out a checkpoint, or backing off a transient I/O failure).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::BackpressureTimeout(_) | Error::WriteFailed(_))
    }

    /// Whether this error indicates a corrupted entity that recovery
    /// attempted to fix.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Error::ChecksumMismatch { .. } | Error::Unrecoverable { .. } | Error::CorruptHeader(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = Error::NotFound("abc123".to_string());
        assert!(err.to_string().contains("abc123"));
    }

    #[test]
    fn checksum_mismatch_is_corruption() {
        let err = Error::ChecksumMismatch {
            entity_id: "e1".to_string(),
        };
        assert!(err.is_corruption());
        assert!(!err.is_retryable());
    }

    #[test]
    fn backpressure_is_retryable() {
        let err = Error::BackpressureTimeout("wal full".to_string());
        assert!(err.is_retryable());
    }
}
