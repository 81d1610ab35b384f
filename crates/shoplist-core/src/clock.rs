//! Wall-clock source for ledger timestamps

use chrono::NaiveDateTime;

/// Source of the timestamps written to `added_at` / `done_at`
pub trait Clock: Send + Sync {
    /// Current local time
    fn now(&self) -> NaiveDateTime;
}

/// Local system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

/// A clock that only moves when told to
#[cfg(any(test, feature = "test-util"))]
#[derive(Debug)]
pub struct FixedClock {
    now: std::sync::Mutex<NaiveDateTime>,
}

#[cfg(any(test, feature = "test-util"))]
impl FixedClock {
    /// Create a clock frozen at `now`
    #[must_use]
    pub const fn new(now: NaiveDateTime) -> Self {
        Self {
            now: std::sync::Mutex::new(now),
        }
    }

    /// Move the clock to `now`
    pub fn set(&self, now: NaiveDateTime) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }
}

#[cfg(any(test, feature = "test-util"))]
impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.now
            .lock()
            .map(|guard| *guard)
            .unwrap_or_else(|poisoned| *poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn test_fixed_clock_moves_only_on_set() {
        let t1 = NaiveDate::from_ymd_opt(2026, 1, 2)
            .and_then(|d| d.and_hms_opt(3, 4, 0))
            .unwrap_or_default();
        let t2 = NaiveDate::from_ymd_opt(2026, 1, 2)
            .and_then(|d| d.and_hms_opt(5, 6, 0))
            .unwrap_or_default();
        let clock = FixedClock::new(t1);
        assert_eq!(clock.now(), t1);
        assert_eq!(clock.now(), t1);
        clock.set(t2);
        assert_eq!(clock.now(), t2);
    }
}
