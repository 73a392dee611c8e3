//! Calendar helpers: billing months and reporting periods

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{FinsightError, Result};

/// A calendar month, written `YYYY-MM`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Month(NaiveDate);

impl Month {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        NaiveDate::from_ymd_opt(year, month, 1)
            .map(Month)
            .ok_or_else(|| FinsightError::validation(format!("invalid month {}-{}", year, month)))
    }

    /// Month containing `date`
    pub fn of(date: NaiveDate) -> Self {
        Month(date - Days::new(u64::from(date.day0())))
    }

    pub fn first_day(&self) -> NaiveDate {
        self.0
    }

    pub fn last_day(&self) -> NaiveDate {
        self.next().0 - Days::new(1)
    }

    pub fn next(&self) -> Month {
        Month(self.0 + Months::new(1))
    }

    pub fn prev(&self) -> Month {
        Month(self.0 - Months::new(1))
    }

    /// Months after this one (negative values go back)
    pub fn offset(&self, months: i32) -> Month {
        if months >= 0 {
            Month(self.0 + Months::new(months.unsigned_abs()))
        } else {
            Month(self.0 - Months::new(months.unsigned_abs()))
        }
    }

    /// Number of days in the month
    pub fn days(&self) -> u32 {
        self.last_day().day()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        Month::of(date) == *self
    }

    /// Whether the month shares at least one day with `period`
    pub fn overlaps(&self, period: &Period) -> bool {
        self.first_day() <= period.end && self.last_day() >= period.start
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m"))
    }
}

impl FromStr for Month {
    type Err = FinsightError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.len() != 7 {
            return Err(FinsightError::validation(format!(
                "month must be YYYY-MM (got '{}')",
                s
            )));
        }
        NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d")
            .map(Month)
            .map_err(|_| FinsightError::validation(format!("month must be YYYY-MM (got '{}')", s)))
    }
}

impl TryFrom<String> for Month {
    type Error = FinsightError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Month> for String {
    fn from(month: Month) -> Self {
        month.to_string()
    }
}

/// Inclusive date window a statement is computed over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end < start {
            return Err(FinsightError::validation(format!(
                "period end {} is before start {}",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    pub fn month(month: Month) -> Self {
        Self {
            start: month.first_day(),
            end: month.last_day(),
        }
    }

    /// First of the current month through `today`
    pub fn this_month(today: NaiveDate) -> Self {
        Self {
            start: Month::of(today).first_day(),
            end: today,
        }
    }

    pub fn last_month(today: NaiveDate) -> Self {
        Self::month(Month::of(today).prev())
    }

    /// Start of the current calendar quarter through `today`
    pub fn this_quarter(today: NaiveDate) -> Self {
        Self {
            start: quarter_start(today),
            end: today,
        }
    }

    pub fn last_quarter(today: NaiveDate) -> Self {
        let start = Month::of(quarter_start(today)).offset(-3);
        Self {
            start: start.first_day(),
            end: start.offset(2).last_day(),
        }
    }

    pub fn year_to_date(today: NaiveDate) -> Self {
        Self {
            start: Month::of(today).offset(-(today.month0() as i32)).first_day(),
            end: today,
        }
    }

    /// Inclusive number of days in the period
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Calendar months touched by the period, in order
    pub fn months(&self) -> Vec<Month> {
        let mut months = Vec::new();
        let mut current = Month::of(self.start);
        let last = Month::of(self.end);
        while current <= last {
            months.push(current);
            current = current.next();
        }
        months
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

fn quarter_start(date: NaiveDate) -> NaiveDate {
    let month = Month::of(date);
    month.offset(-((date.month0() % 3) as i32)).first_day()
}

/// Whole days from `from` to `to` (negative when `to` is earlier)
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}
