//! Time source used for polling and log timestamps.

use std::cell::Cell;
use std::time::{Duration, Instant};

/// Source of time for the evacuation run.
///
/// Time is measured in seconds since the clock was created. `sleep` suspends the caller until the specified amount
/// of time has passed, which makes it possible to replace real waiting with virtual time in tests.
pub trait Clock {
    fn now(&self) -> f64;

    fn sleep(&self, duration: f64);
}

/// Wall clock which blocks the calling thread on sleep.
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    fn sleep(&self, duration: f64) {
        if duration > 0. {
            std::thread::sleep(Duration::from_secs_f64(duration));
        }
    }
}

/// Virtual clock which advances instantly on sleep.
#[derive(Default)]
pub struct ManualClock {
    time: Cell<f64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the clock forward without sleeping.
    pub fn advance(&self, duration: f64) {
        self.time.set(self.time.get() + duration);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.time.get()
    }

    fn sleep(&self, duration: f64) {
        if duration > 0. {
            self.advance(duration);
        }
    }
}
