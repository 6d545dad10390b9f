//! Time source for paced streaming and settle polling.
//!
//! Times are offsets from the clock's own origin, so schedules can be built
//! with plain `Duration` arithmetic.

use std::time::{Duration, Instant};

/// Monotonic time source with blocking sleep.
pub trait Clock {
    /// Elapsed time since the clock's origin.
    fn now(&self) -> Duration;

    /// Block until `now() >= deadline`. Returns at once if already past.
    fn sleep_until(&mut self, deadline: Duration);

    /// Block for `period`.
    fn sleep(&mut self, period: Duration) {
        let deadline = self.now().saturating_add(period);
        self.sleep_until(deadline);
    }
}

/// Wall-clock time via `Instant` and `std::thread::sleep`.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Clock with its origin at the moment of creation.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep_until(&mut self, deadline: Duration) {
        let now = self.now();
        if deadline > now {
            std::thread::sleep(deadline - now);
        }
    }
}

/// Virtual clock that only moves when slept on. Sleeping never blocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManualClock {
    now: Duration,
}

impl ManualClock {
    /// Clock at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward by `dt`.
    pub fn advance(&mut self, dt: Duration) {
        self.now += dt;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now
    }

    fn sleep_until(&mut self, deadline: Duration) {
        self.now = self.now.max(deadline);
    }
}
