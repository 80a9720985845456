use std::fmt::Debug;
use std::time::{Duration, Instant};

/// Time source for training budgets.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> Instant;

    /// Time passed since `earlier`, never negative.
    fn elapsed_since(&self, earlier: Instant) -> Duration {
        self.now().saturating_duration_since(earlier)
    }
}

/// Monotonic wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that never advances, so budgets only expire when they are zero.
#[derive(Debug, Clone, Copy)]
pub struct FrozenClock(Instant);

impl FrozenClock {
    pub fn new() -> Self {
        Self(Instant::now())
    }
}

impl Default for FrozenClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FrozenClock {
    fn now(&self) -> Instant {
        self.0
    }
}
