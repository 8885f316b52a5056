use chrono::{DateTime, Duration, Utc};

/// A simple clock abstraction for deterministic time in services and tests.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    Default,
    Fixed(DateTime<Utc>),
}

impl Clock {
    /// Returns a clock that uses the current system time.
    #[must_use]
    pub fn default_clock() -> Self {
        Self::Default
    }

    /// Returns a clock fixed at the given timestamp.
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    /// Returns the current time according to the clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::Default => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }

    /// If this is a fixed clock, advance it by the given duration.
    ///
    /// Has no effect on `Clock::Default`.
    pub fn advance(&mut self, delta: Duration) {
        if let Clock::Fixed(t) = self {
            *t += delta;
        }
    }
}

/// Per-view reading-time accumulator.
///
/// One timer lives inside each open content view; the view's one-second
/// interval calls [`ReadingTimer::tick`], and the accumulated total is read
/// once when the user marks the section as read. The counter is local to a
/// single view lifetime (single writer, single reader), so it carries no
/// synchronization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadingTimer {
    seconds: u32,
}

impl ReadingTimer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one elapsed second. Saturates instead of wrapping.
    pub fn tick(&mut self) {
        self.seconds = self.seconds.saturating_add(1);
    }

    /// Total seconds accumulated so far.
    #[must_use]
    pub fn seconds(&self) -> u32 {
        self.seconds
    }

    /// Restart the counter, e.g. when the view is re-entered.
    pub fn reset(&mut self) {
        self.seconds = 0;
    }
}

/// Deterministic timestamp for tests and examples (2023-11-14T22:13:20Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Returns a deterministic `DateTime<Utc>` for tests and doc examples.
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_advances() {
        let mut clock = fixed_clock();
        let before = clock.now();
        clock.advance(Duration::seconds(42));
        assert_eq!(clock.now() - before, Duration::seconds(42));
    }

    #[test]
    fn reading_timer_accumulates() {
        let mut timer = ReadingTimer::new();
        for _ in 0..42 {
            timer.tick();
        }
        assert_eq!(timer.seconds(), 42);

        timer.reset();
        assert_eq!(timer.seconds(), 0);
    }
}
