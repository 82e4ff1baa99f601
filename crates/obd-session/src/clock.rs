//! Millisecond clocks used for timeout bookkeeping

use std::cell::Cell;
use std::time::Instant;

/// Monotonic millisecond counter
pub trait Clock {
    /// Milliseconds since an arbitrary fixed origin
    fn now_ms(&self) -> u64;
}

/// Clock backed by [`Instant`], origin at construction
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Create a clock starting at zero now
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
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Deterministic clock that advances by a fixed step every time it is read.
///
/// Lets timeout paths run instantly in tests and simulations.
#[derive(Debug)]
pub struct StepClock {
    now: Cell<u64>,
    step: u64,
}

impl StepClock {
    /// Create a clock at zero advancing `step_ms` per sample
    pub fn new(step_ms: u64) -> Self {
        Self {
            now: Cell::new(0),
            step: step_ms,
        }
    }

    /// Number of milliseconds elapsed so far
    pub fn elapsed_ms(&self) -> u64 {
        self.now.get()
    }
}

impl Clock for StepClock {
    fn now_ms(&self) -> u64 {
        let now = self.now.get();
        self.now.set(now + self.step);
        now
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_clock_advances_per_sample() {
        let clock = StepClock::new(5);
        assert_eq!(clock.now_ms(), 0);
        assert_eq!(clock.now_ms(), 5);
        assert_eq!(clock.elapsed_ms(), 10);
    }

    #[test]
    fn test_monotonic_clock_never_goes_back() {
        let clock = MonotonicClock::new();
        let a = clock.now_ms();
        let b = clock.now_ms();
        assert!(b >= a);
    }
}
