//! Time source for the session engine and the services around it.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Duration, SubsecRound, Utc};

/// Where "now" comes from.
///
/// Engine operations take `now` as an argument; callers read it from a
/// `Clock` so that tests can pin or step time.
#[derive(Debug, Clone, Default)]
pub enum Clock {
    #[default]
    System,
    Fixed(DateTime<Utc>),
    Manual(ManualClock),
}

impl Clock {
    /// Returns a clock fixed at the given timestamp.
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    /// Returns a clock that starts at `at` and moves only when advanced.
    ///
    /// Clones share the same time, so a test can keep a handle while a
    /// service owns another.
    #[must_use]
    pub fn manual(at: DateTime<Utc>) -> Self {
        Self::Manual(ManualClock::new(at))
    }

    /// Current time, in whole milliseconds.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => to_millis(Utc::now()),
            Clock::Fixed(t) => to_millis(*t),
            Clock::Manual(m) => m.now(),
        }
    }

    /// Move a fixed or manual clock forward. No effect on `Clock::System`.
    pub fn advance(&mut self, delta: Duration) {
        match self {
            Clock::System => {}
            Clock::Fixed(t) => *t += delta,
            Clock::Manual(m) => m.advance(delta),
        }
    }

    #[must_use]
    pub fn is_system(&self) -> bool {
        matches!(self, Clock::System)
    }
}

/// Shared, manually stepped time in epoch milliseconds.
#[derive(Debug, Clone)]
pub struct ManualClock(Arc<AtomicI64>);

impl ManualClock {
    #[must_use]
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(Arc::new(AtomicI64::new(at.timestamp_millis())))
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        let ms = self.0.load(Ordering::SeqCst);
        DateTime::from_timestamp_millis(ms).unwrap_or(DateTime::UNIX_EPOCH)
    }

    pub fn advance(&self, delta: Duration) {
        self.0.fetch_add(delta.num_milliseconds(), Ordering::SeqCst);
    }
}

/// Drop sub-millisecond precision.
///
/// Progress is stored as epoch milliseconds, so every timestamp that enters
/// a state or progress record is cut to that precision first.
#[must_use]
pub fn to_millis(at: DateTime<Utc>) -> DateTime<Utc> {
    at.trunc_subsecs(3)
}

/// Deterministic timestamp for tests and fixtures (2023-11-14T22:13:20Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Returns a deterministic `DateTime<Utc>` for tests.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

/// Returns a `Clock` fixed at the deterministic test timestamp.
#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}
