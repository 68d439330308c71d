//! Single-flight transition guard

use std::sync::atomic::{AtomicBool, Ordering};

/// Held while a transition (seek and bookkeeping) is in flight
///
/// Acquired by compare-and-swap on the engine's `transitioning` flag and
/// released on drop, including when the holder returns early with `?`.
#[derive(Debug)]
pub struct TransitionGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> TransitionGuard<'a> {
    /// Take the flag, or `None` if another transition holds it
    pub fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for TransitionGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
