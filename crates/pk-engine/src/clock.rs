//! Monotonic time sources for the scheduler.

use core::time::Duration;
use pk_ir::Instant;

/// A monotonic clock the scheduler can read and sleep on.
pub trait Clock {
    /// Current time.
    fn now(&self) -> Instant;

    /// Block for `duration`. The scheduler's only suspension point.
    fn sleep(&mut self, duration: Duration);
}

/// A clock that only moves when told to.
///
/// `sleep` advances time instantly, so a scheduler driven by a
/// `ManualClock` runs a simulated timeline as fast as the host can go.
#[derive(Clone, Copy, Debug, Default)]
pub struct ManualClock {
    now: Instant,
}

impl ManualClock {
    pub fn new() -> Self {
        Self { now: Instant::ZERO }
    }

    /// Start at a given instant.
    pub fn starting_at(now: Instant) -> Self {
        Self { now }
    }

    pub fn advance(&mut self, duration: Duration) {
        self.now += duration;
    }

    /// Jump to `now`. Moving backwards is ignored.
    pub fn set(&mut self, now: Instant) {
        self.now = self.now.max(now);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now
    }

    fn sleep(&mut self, duration: Duration) {
        self.advance(duration);
    }
}

/// Wall clock backed by `std::time::Instant`.
#[cfg(feature = "std")]
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    origin: std::time::Instant,
}

#[cfg(feature = "std")]
impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

#[cfg(feature = "std")]
impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        let micros = u64::try_from(self.origin.elapsed().as_micros()).unwrap_or(u64::MAX);
        Instant::from_micros(micros)
    }

    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_sleep_advances() {
        let mut clock = ManualClock::new();
        clock.sleep(Duration::from_millis(5));
        assert_eq!(clock.now(), Instant::from_millis(5));
    }

    #[test]
    fn manual_clock_never_goes_back() {
        let mut clock = ManualClock::starting_at(Instant::from_millis(10));
        clock.set(Instant::from_millis(3));
        assert_eq!(clock.now(), Instant::from_millis(10));
        clock.set(Instant::from_millis(12));
        assert_eq!(clock.now(), Instant::from_millis(12));
    }

    #[cfg(feature = "std")]
    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
