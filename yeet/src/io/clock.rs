//! Time source for the deploy loop.

use std::thread;
use std::time::{Duration, Instant};

/// Monotonic time plus the ability to wait. Injected so deadline handling
/// can be tested without real sleeps.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}
