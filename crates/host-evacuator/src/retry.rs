//! Bounded waiting for an asynchronous state change.

use crate::clock::Clock;

/// Checks a condition at a fixed interval until it holds or the maximum wait time passes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub interval: f64,
    pub max_wait: f64,
}

impl RetryPolicy {
    pub fn new(interval: f64, max_wait: f64) -> Self {
        Self { interval, max_wait }
    }

    /// Invokes `probe` until it returns a value or the deadline passes.
    ///
    /// The probe is invoked immediately, then after every `interval` seconds, and one last time at the deadline.
    /// Returns `None` if the probe has not produced a value by the deadline.
    pub fn wait_for<T, F>(&self, clock: &dyn Clock, mut probe: F) -> Option<T>
    where
        F: FnMut() -> Option<T>,
    {
        let deadline = clock.now() + self.max_wait;
        loop {
            if let Some(result) = probe() {
                return Some(result);
            }
            let now = clock.now();
            if now >= deadline {
                return None;
            }
            clock.sleep(self.interval.min(deadline - now));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn test_probe_times() {
        let clock = ManualClock::new();
        let mut probes = Vec::new();
        let result: Option<()> = RetryPolicy::new(3., 10.).wait_for(&clock, || {
            probes.push(clock.now());
            None
        });
        assert_eq!(result, None);
        assert_eq!(probes, vec![0., 3., 6., 9., 10.]);
        assert_eq!(clock.now(), 10.);
    }

    #[test]
    fn test_stops_on_success() {
        let clock = ManualClock::new();
        let mut attempts = 0;
        let result = RetryPolicy::new(3., 10.).wait_for(&clock, || {
            attempts += 1;
            if attempts == 2 {
                Some(attempts)
            } else {
                None
            }
        });
        assert_eq!(result, Some(2));
        assert_eq!(clock.now(), 3.);
    }

    #[test]
    fn test_zero_wait() {
        let clock = ManualClock::new();
        let mut attempts = 0;
        let result: Option<()> = RetryPolicy::new(3., 0.).wait_for(&clock, || {
            attempts += 1;
            None
        });
        assert_eq!(result, None);
        assert_eq!(attempts, 1);
    }
}
