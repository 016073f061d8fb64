//! Monotonic time abstraction.
//!
//! The runtime never reads hardware counters directly; it consumes a
//! [`Clock`] and reasons about [`Instant`]s. Timestamps are microseconds
//! from an arbitrary epoch (typically power-on), which keeps scheduler
//! arithmetic in plain integers and makes virtual time trivial to provide
//! from a test harness.

use core::ops::Add;
use core::time::Duration;

/// A point on the monotonic timeline, in microseconds from an arbitrary
/// epoch.
///
/// Ordering and equality follow the raw counter value. Arithmetic
/// saturates instead of wrapping: an `Instant` near the end of the u64
/// range stays pinned there rather than jumping backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Instant(u64);

impl Instant {
    /// The epoch itself. Freshly registered periodic work anchors here so
    /// that its first deadline has always already passed.
    pub const ZERO: Instant = Instant(0);

    /// Construct from a microsecond count.
    pub const fn from_micros(us: u64) -> Self {
        Instant(us)
    }

    /// Construct from a millisecond count.
    pub const fn from_millis(ms: u64) -> Self {
        Instant(ms.saturating_mul(1_000))
    }

    /// Microseconds since the epoch.
    pub const fn as_micros(self) -> u64 {
        self.0
    }

    /// Advance by `d`, saturating at the end of the timeline.
    pub fn saturating_add(self, d: Duration) -> Self {
        let us = u64::try_from(d.as_micros()).unwrap_or(u64::MAX);
        Instant(self.0.saturating_add(us))
    }

    /// Time elapsed since `earlier`, or `None` if `earlier` is actually
    /// later than `self`.
    pub fn checked_duration_since(self, earlier: Instant) -> Option<Duration> {
        self.0.checked_sub(earlier.0).map(Duration::from_micros)
    }

    /// Time elapsed since `earlier`, clamped to zero if `earlier` is later.
    pub fn saturating_duration_since(self, earlier: Instant) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for Instant {
    type Output = Instant;

    /// Saturating addition; see [`Instant::saturating_add`].
    fn add(self, rhs: Duration) -> Instant {
        self.saturating_add(rhs)
    }
}

/// Abstraction over monotonic time sources.
///
/// Implementations must never step backwards. On hardware this is usually
/// a thin wrapper over a timer peripheral; hosts and tests provide a
/// virtual clock they advance by hand.
pub trait Clock {
    /// Current time. Units must be consistent with the durations passed
    /// to the registration API, which [`Instant`] already guarantees.
    fn now(&mut self) -> Instant;
}

impl<C: Clock + ?Sized> Clock for &mut C {
    fn now(&mut self) -> Instant {
        (**self).now()
    }
}
