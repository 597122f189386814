//! Time source for message timestamps

use std::sync::atomic::{AtomicU64, Ordering};

/// Milliseconds since the Unix epoch
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Deterministic clock: every read returns the current value, then advances by `step`.
#[derive(Debug)]
pub struct ManualClock {
    next: AtomicU64,
    step: u64,
}

impl ManualClock {
    pub fn new(start: u64, step: u64) -> Self {
        Self { next: AtomicU64::new(start), step }
    }

    /// Clock that never advances on its own
    pub fn frozen(at: u64) -> Self {
        Self::new(at, 0)
    }

    pub fn set(&self, millis: u64) {
        self.next.store(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.next.fetch_add(self.step, Ordering::SeqCst)
    }
}
