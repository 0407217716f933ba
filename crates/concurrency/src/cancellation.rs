//! Cooperative cancellation, checked at natural call boundaries rather
//! than preempting in-flight work.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A cancellable deadline shared between a caller and whatever code is
/// doing work on its behalf (a backpressure wait, a multi-chunk read).
#[derive(Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    deadline: Instant,
}

impl CancellationToken {
    pub fn with_timeout(timeout: Duration) -> Self {
        CancellationToken {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Instant::now() + timeout,
        }
    }

    /// A token that never expires and is never externally cancelled;
    /// used by internal callers (recovery, background workers) that don't
    /// want backpressure to ever time them out.
    pub fn never() -> Self {
        CancellationToken {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Instant::now() + Duration::from_secs(u64::MAX / 2),
        }
    }

    /// Explicitly cancels this token; visible to every clone.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst) || Instant::now() >= self.deadline
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Checked at "natural boundaries" per the concurrency model: start of
    /// a read, after each content chunk, before a backpressure wait.
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Marker error: callers map this to whatever error kind fits their call
/// site (a backpressure wait maps it to `Error::BackpressureTimeout`).
#[derive(Debug, Clone, Copy)]
pub struct Cancelled;
