//! Cooperative cancellation flag.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared run/stop signal polled by every loop in the engine.
///
/// Clones share one flag. This is a pure cooperative signal, not a lock:
/// a single automaton polls it at defined points (top of each outer
/// iteration, top of each inner search iteration, after each recovery),
/// so the worst-case stop latency is one in-flight step plus any
/// non-interruptible hold.
///
/// Set to stopped externally by the operator, or internally when a booking
/// is confirmed and polling should end.
#[derive(Clone, Debug)]
pub struct RunningFlag(Arc<AtomicBool>);

impl RunningFlag {
    /// A new flag in the running state.
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Requests termination. Idempotent.
    pub fn stop(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Default for RunningFlag {
    fn default() -> Self {
        Self::new()
    }
}
