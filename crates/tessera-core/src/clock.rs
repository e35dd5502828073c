//! The [`VersionClock`]: a monotonically increasing stamp source.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::id::Stamp;

/// Monotonic counter that orders every mutation in a pipeline.
///
/// Each parameter change and each successful stage execution draws a
/// fresh [`Stamp`] from the clock. Comparing stamps is how the engine
/// decides staleness, so the clock never rolls back.
///
/// The clock is an explicit object owned by its pipeline rather than a
/// process global: independent pipelines (and independent tests) never
/// observe each other's stamps. [`next`](Self::next) takes `&self` so a
/// clock can be shared behind an `Arc` when several graphs must agree
/// on a single ordering.
#[derive(Debug, Default)]
pub struct VersionClock {
    last: AtomicU64,
}

impl VersionClock {
    /// A clock that has not issued any stamp yet.
    pub fn new() -> Self {
        Self {
            last: AtomicU64::new(Stamp::NEVER.0),
        }
    }

    /// Issue a new stamp, strictly greater than every stamp issued before.
    pub fn next(&self) -> Stamp {
        Stamp(self.last.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// The most recently issued stamp, or [`Stamp::NEVER`].
    pub fn current(&self) -> Stamp {
        Stamp(self.last.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_clock_has_issued_nothing() {
        let clock = VersionClock::new();
        assert_eq!(clock.current(), Stamp::NEVER);
        assert!(clock.current().is_never());
    }

    #[test]
    fn stamps_are_strictly_increasing() {
        let clock = VersionClock::new();
        let mut prev = clock.next();
        assert!(!prev.is_never());
        for _ in 0..100 {
            let s = clock.next();
            assert!(s > prev);
            prev = s;
        }
        assert_eq!(clock.current(), prev);
    }

    #[test]
    fn independent_clocks_do_not_interfere() {
        let a = VersionClock::new();
        let b = VersionClock::new();
        a.next();
        a.next();
        assert_eq!(b.next(), Stamp(1));
        assert_eq!(a.current(), Stamp(2));
    }
}
