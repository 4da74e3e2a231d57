//! Time source abstraction.
//!
//! Every lifecycle decision (key activity, expiry, token `exp`/`iat`) reads the
//! current time through a [`Clock`], so tests and simulations can drive time
//! explicitly with [`ManualClock`] instead of sleeping.

use std::{fmt, sync::Arc, time::Duration};

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;

/// Source of the current UTC time.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time from the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same underlying instant, so a test can hand one clone to
/// the registry and keep another to advance time.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use geotracker_common_storage::{Clock, ManualClock};
///
/// let clock = ManualClock::starting_now();
/// let before = clock.now();
/// clock.advance(Duration::from_secs(90));
/// assert_eq!((clock.now() - before).num_seconds(), 90);
/// ```
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<RwLock<DateTime<Utc>>>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Arc::new(RwLock::new(start)) }
    }

    /// Creates a clock frozen at the current wall-clock time.
    #[must_use]
    pub fn starting_now() -> Self {
        Self::new(Utc::now())
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write();
        *now = add_duration(*now, by);
    }

    /// Moves the clock backward by `by`, simulating a wall-clock step.
    pub fn rewind(&self, by: Duration) {
        let mut now = self.now.write();
        *now = to_delta(by)
            .and_then(|d| now.checked_sub_signed(d))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
    }

    /// Jumps the clock to `at`.
    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.write() = at;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::starting_now()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}

/// Adds a std duration to an instant, saturating at the maximum representable time.
#[must_use]
pub fn add_duration(at: DateTime<Utc>, by: Duration) -> DateTime<Utc> {
    to_delta(by).and_then(|d| at.checked_add_signed(d)).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn to_delta(d: Duration) -> Option<TimeDelta> {
    TimeDelta::from_std(d).ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_clones_share_time() {
        let clock = ManualClock::starting_now();
        let other = clock.clone();
        let start = clock.now();

        other.advance(Duration::from_secs(5));
        assert_eq!(clock.now() - start, TimeDelta::seconds(5));

        clock.rewind(Duration::from_secs(10));
        assert_eq!(other.now() - start, TimeDelta::seconds(-5));
    }

    #[test]
    fn test_add_duration_saturates() {
        let max = DateTime::<Utc>::MAX_UTC;
        assert_eq!(add_duration(max, Duration::from_secs(1)), max);
        assert_eq!(add_duration(Utc::now(), Duration::MAX), max);
    }

    #[test]
    fn test_system_clock_is_close_to_wall_time() {
        let diff = Utc::now() - SystemClock.now();
        assert!(diff.num_seconds().abs() < 2);
    }
}
