//! Sources of "today" for scheduling. Only the calendar day matters.

use chrono::{Days, Local, NaiveDate};
use std::sync::Mutex;

pub trait Clock {
    fn today(&self) -> NaiveDate;
}

/// The local calendar date of the machine.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    today: Mutex<NaiveDate>,
}

impl FixedClock {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today: Mutex::new(today),
        }
    }

    pub fn set(&self, day: NaiveDate) {
        *self.today.lock().unwrap_or_else(|e| e.into_inner()) = day;
    }

    pub fn advance_days(&self, days: u64) -> NaiveDate {
        let mut today = self.today.lock().unwrap_or_else(|e| e.into_inner());
        *today = today.checked_add_days(Days::new(days)).unwrap_or(NaiveDate::MAX);
        *today
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        *self.today.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock_moves_on_request() {
        let start = NaiveDate::from_ymd_opt(2024, 12, 30).unwrap();
        let clock = FixedClock::new(start);
        assert_eq!(clock.today(), start);

        assert_eq!(clock.advance_days(3), NaiveDate::from_ymd_opt(2025, 1, 2).unwrap());
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2025, 1, 2).unwrap());

        clock.set(start);
        assert_eq!(clock.today(), start);
    }
}
