//! Monotonic time representation.

use core::ops::{Add, AddAssign, Sub};
use core::time::Duration;

/// A point on a monotonic clock, in microseconds since an arbitrary epoch.
///
/// Kept as a plain integer so it works without `std` and compares cheaply.
/// Subtraction saturates at zero instead of panicking.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Instant {
    micros: u64,
}

impl Instant {
    /// The clock epoch.
    pub const ZERO: Instant = Instant { micros: 0 };

    /// Create an instant from microseconds.
    pub const fn from_micros(micros: u64) -> Self {
        Self { micros }
    }

    /// Create an instant from milliseconds.
    pub const fn from_millis(millis: u64) -> Self {
        Self { micros: millis * 1_000 }
    }

    /// Create an instant from seconds. Negative and NaN map to the epoch,
    /// values too large for a `Duration` saturate.
    pub fn from_secs_f32(secs: f32) -> Self {
        Self::ZERO + Duration::try_from_secs_f32(secs.max(0.0)).unwrap_or(Duration::MAX)
    }

    /// Microseconds since the epoch.
    pub const fn as_micros(self) -> u64 {
        self.micros
    }

    /// Time elapsed since `earlier`, or zero if `earlier` is later.
    pub fn saturating_duration_since(self, earlier: Instant) -> Duration {
        Duration::from_micros(self.micros.saturating_sub(earlier.micros))
    }

    /// Move this instant back by `d`, stopping at the epoch.
    pub fn saturating_sub(self, d: Duration) -> Self {
        Self {
            micros: self.micros.saturating_sub(duration_micros(d)),
        }
    }
}

fn duration_micros(d: Duration) -> u64 {
    u64::try_from(d.as_micros()).unwrap_or(u64::MAX)
}

impl Add<Duration> for Instant {
    type Output = Instant;

    fn add(self, rhs: Duration) -> Instant {
        Instant {
            micros: self.micros.saturating_add(duration_micros(rhs)),
        }
    }
}

impl AddAssign<Duration> for Instant {
    fn add_assign(&mut self, rhs: Duration) {
        *self = *self + rhs;
    }
}

impl Sub<Instant> for Instant {
    type Output = Duration;

    fn sub(self, rhs: Instant) -> Duration {
        self.saturating_duration_since(rhs)
    }
}
