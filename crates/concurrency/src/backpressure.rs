//! Condvar-gated write admission, so the WAL can't grow unboundedly
//! between checkpoints: once tracked WAL bytes cross a threshold, new
//! writers block until the checkpointer reports it has freed room.

use crate::cancellation::CancellationToken;
use entitydb_core::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Blocks new writers once the tracked WAL size exceeds
/// `wal_checkpoint_bytes`, releasing them when the checkpointer reports a
/// new low-water mark.
pub struct AdmissionController {
    threshold_bytes: u64,
    current_wal_bytes: AtomicU64,
    gate: Mutex<()>,
    released: Condvar,
}

impl AdmissionController {
    pub fn new(threshold_bytes: u64) -> Self {
        AdmissionController {
            threshold_bytes,
            current_wal_bytes: AtomicU64::new(0),
            gate: Mutex::new(()),
            released: Condvar::new(),
        }
    }

    /// Called by the writer after every WAL append to report the new WAL
    /// section length.
    pub fn report_wal_bytes(&self, bytes: u64) {
        self.current_wal_bytes.store(bytes, Ordering::SeqCst);
    }

    /// Called by the checkpointer once it has durably persisted and
    /// truncated the WAL, to wake any writer blocked in `admit`.
    pub fn signal_checkpoint_complete(&self, new_wal_bytes: u64) {
        self.current_wal_bytes.store(new_wal_bytes, Ordering::SeqCst);
        let _guard = self.gate.lock();
        self.released.notify_all();
    }

    fn over_threshold(&self) -> bool {
        self.current_wal_bytes.load(Ordering::SeqCst) > self.threshold_bytes
    }

    /// Blocks the calling writer while the WAL is over threshold. Returns
    /// `Error::BackpressureTimeout` if `token` is cancelled or its
    /// deadline passes while waiting; backpressure itself never times a
    /// writer out — only an already-cancelled/expired token does.
    pub fn admit(&self, token: &CancellationToken) -> Result<()> {
        if !self.over_threshold() {
            return Ok(());
        }
        let mut guard = self.gate.lock();
        while self.over_threshold() {
            if token.cancelled() {
                return Err(Error::BackpressureTimeout(
                    "write cancelled while waiting for WAL checkpoint".into(),
                ));
            }
            let remaining = token.deadline().saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::BackpressureTimeout(
                    "deadline reached while waiting for WAL checkpoint".into(),
                ));
            }
            let timeout = remaining.min(std::time::Duration::from_millis(100));
            self.released.wait_for(&mut guard, timeout);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn admits_immediately_under_threshold() {
        let controller = AdmissionController::new(1024);
        controller.report_wal_bytes(10);
        let token = CancellationToken::with_timeout(Duration::from_secs(1));
        assert!(controller.admit(&token).is_ok());
    }

    #[test]
    fn times_out_when_cancelled_while_over_threshold() {
        let controller = AdmissionController::new(1024);
        controller.report_wal_bytes(2048);
        let token = CancellationToken::with_timeout(Duration::from_millis(10));
        let result = controller.admit(&token);
        assert!(result.is_err());
    }

    #[test]
    fn checkpoint_signal_releases_waiters() {
        let controller = std::sync::Arc::new(AdmissionController::new(1024));
        controller.report_wal_bytes(2048);
        let token = CancellationToken::with_timeout(Duration::from_secs(5));

        let waiter_controller = controller.clone();
        let waiter = std::thread::spawn(move || waiter_controller.admit(&token));

        std::thread::sleep(Duration::from_millis(20));
        controller.signal_checkpoint_complete(0);

        assert!(waiter.join().unwrap().is_ok());
    }
}
