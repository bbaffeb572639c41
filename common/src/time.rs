//! Time utilities and the clock abstraction used to stamp sheets and results.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

/// A timestamp with timezone (always UTC).
pub type Timestamp = DateTime<Utc>;

/// Get the current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

/// Midnight UTC at the start of `date`.
pub fn utc_midnight(date: NaiveDate) -> Timestamp {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Source of wall-clock time.
///
/// Parsing stamps `fetched_at`/`last_updated` and conversion stamps
/// `computed_at` through this trait so tests can pin time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;

    /// Check if a timestamp lies after the current instant.
    fn is_future(&self, timestamp: Timestamp) -> bool {
        timestamp > self.now()
    }
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        now()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Timestamp);

impl FixedClock {
    pub fn new(at: Timestamp) -> Self {
        Self(at)
    }

    /// Return a clock moved forward by `by`.
    pub fn advanced(&self, by: Duration) -> Self {
        Self(self.0 + by)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Timelike};

    #[test]
    fn test_utc_midnight() {
        let date = NaiveDate::from_ymd_opt(2024, 9, 27).unwrap();
        let ts = utc_midnight(date);
        assert_eq!((ts.year(), ts.month(), ts.day()), (2024, 9, 27));
        assert_eq!((ts.hour(), ts.minute(), ts.second()), (0, 0, 0));
    }

    #[test]
    fn test_fixed_clock() {
        let at = Utc.with_ymd_and_hms(2024, 9, 27, 14, 30, 0).unwrap();
        let clock = FixedClock::new(at);
        assert_eq!(clock.now(), at);
        assert!(clock.is_future(at + Duration::seconds(1)));
        assert!(!clock.is_future(at));
        assert_eq!(clock.advanced(Duration::minutes(5)).now(), at + Duration::minutes(5));
    }

    #[test]
    fn test_system_clock_is_not_ahead_of_itself() {
        let clock = SystemClock;
        let before = clock.now();
        assert!(!clock.is_future(before));
    }
}
