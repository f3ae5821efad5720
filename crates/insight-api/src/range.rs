//! UTC reporting periods as inclusive millisecond ranges
//!
//! Weeks start on Monday. Every range runs from 00:00:00.000 of its first
//! day to 23:59:59.999 of its last day, UTC.

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

const DAY_MILLIS: i64 = 86_400_000;

/// Inclusive `[start, end]` range in unix milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: i64,
    pub end: i64,
}

impl TimeRange {
    /// Whole days from `first` through `last`.
    pub fn days(first: NaiveDate, last: NaiveDate) -> Self {
        Self {
            start: midnight_millis(first),
            end: midnight_millis(last) + DAY_MILLIS - 1,
        }
    }
}

/// Reporting periods shown in the popup, in aggregation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Today,
    Yesterday,
    ThisWeek,
    LastWeek,
    ThisMonth,
    LastMonth,
}

impl Period {
    pub const ALL: [Period; 6] = [
        Period::Today,
        Period::Yesterday,
        Period::ThisWeek,
        Period::LastWeek,
        Period::ThisMonth,
        Period::LastMonth,
    ];

    /// Range covered by this period relative to `now`.
    pub fn range(self, now: DateTime<Utc>) -> TimeRange {
        let today = now.date_naive();
        match self {
            Period::Today => TimeRange::days(today, today),
            Period::Yesterday => {
                let day = today - Days::new(1);
                TimeRange::days(day, day)
            }
            Period::ThisWeek => {
                let monday = week_start(today);
                TimeRange::days(monday, monday + Days::new(6))
            }
            Period::LastWeek => {
                let monday = week_start(today) - Days::new(7);
                TimeRange::days(monday, monday + Days::new(6))
            }
            Period::ThisMonth => {
                let first = month_start(today);
                TimeRange::days(first, first + Months::new(1) - Days::new(1))
            }
            Period::LastMonth => {
                let first = month_start(today);
                TimeRange::days(first - Months::new(1), first - Days::new(1))
            }
        }
    }
}

fn week_start(day: NaiveDate) -> NaiveDate {
    day - Days::new(u64::from(day.weekday().num_days_from_monday()))
}

fn month_start(day: NaiveDate) -> NaiveDate {
    day - Days::new(u64::from(day.day0()))
}

fn midnight_millis(day: NaiveDate) -> i64 {
    day.and_time(NaiveTime::MIN).and_utc().timestamp_millis()
}
