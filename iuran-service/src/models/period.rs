//! Calendar month arithmetic for dues periods.
//!
//! Dues are owed per calendar month. A [`MonthYear`] is one such month; a [`Window`] is
//! the fixed run of six consecutive months shown on the dashboard grid.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::fmt;

/// Number of months in a dashboard window.
pub const WINDOW_MONTHS: u32 = 6;

const MIN_YEAR: i32 = 1900;
const MAX_YEAR: i32 = 9999;

/// A calendar month. Field order gives chronological `Ord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MonthYear {
    year: i32,
    month: u32,
}

impl MonthYear {
    /// Build a month, rejecting months outside 1..=12 and implausible years.
    pub fn new(month: u32, year: i32) -> Option<Self> {
        if (1..=12).contains(&month) && (MIN_YEAR..=MAX_YEAR).contains(&year) {
            Some(Self { year, month })
        } else {
            None
        }
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    /// Months since year 0, used for range arithmetic and SQL range filters.
    pub fn ordinal(&self) -> i32 {
        self.year * 12 + (self.month as i32 - 1)
    }

    fn from_ordinal(ordinal: i32) -> Self {
        Self {
            year: ordinal.div_euclid(12),
            month: ordinal.rem_euclid(12) as u32 + 1,
        }
    }

    /// Move forward (positive) or backward (negative) by whole months, wrapping years.
    pub fn shift(&self, months: i32) -> Self {
        Self::from_ordinal(self.ordinal() + months)
    }

    pub fn next(&self) -> Self {
        self.shift(1)
    }

    /// First day of the month, the representative date for tariff lookups.
    pub fn first_day(&self) -> NaiveDate {
        // month is always 1..=12 and year within chrono's range
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or_default()
    }

    /// Last day of the month.
    pub fn last_day(&self) -> NaiveDate {
        self.next()
            .first_day()
            .pred_opt()
            .unwrap_or_else(|| self.first_day())
    }

    /// Number of months from `self` to `other` inclusive, zero when `other` is earlier.
    pub fn months_through(&self, other: MonthYear) -> u32 {
        (other.ordinal() - self.ordinal() + 1).max(0) as u32
    }

    /// Every month from `from` to `to`, inclusive. Empty when `to` precedes `from`.
    pub fn range_inclusive(from: MonthYear, to: MonthYear) -> impl Iterator<Item = MonthYear> {
        (from.ordinal()..=to.ordinal()).map(MonthYear::from_ordinal)
    }
}

impl fmt::Display for MonthYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Six consecutive months beginning at `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    start: MonthYear,
}

impl Window {
    pub fn starting_at(start: MonthYear) -> Self {
        Self { start }
    }

    /// The default window: `today`'s month and the five that follow.
    pub fn current(today: NaiveDate) -> Self {
        Self::starting_at(MonthYear::of(today))
    }

    pub fn start(&self) -> MonthYear {
        self.start
    }

    pub fn end(&self) -> MonthYear {
        self.start.shift(WINDOW_MONTHS as i32 - 1)
    }

    pub fn months(&self) -> Vec<MonthYear> {
        MonthYear::range_inclusive(self.start, self.end()).collect()
    }

    pub fn next(&self) -> Self {
        Self::starting_at(self.start.shift(WINDOW_MONTHS as i32))
    }

    pub fn previous(&self) -> Self {
        Self::starting_at(self.start.shift(-(WINDOW_MONTHS as i32)))
    }
}
