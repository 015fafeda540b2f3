//! Month planning for carbon backfills.
//!
//! The emissions API only serves a limited window of months. A backfill starts
//! at a fixed historical month, writes placeholders for every month the API
//! cannot serve, and performs one live call per month inside the window.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("invalid month {year}-{month}")]
    InvalidMonth { year: i32, month: u32 },
    #[error("api window starts at {start} but ends at {end}")]
    InvertedWindow { start: YearMonth, end: YearMonth },
    #[error("malformed month '{0}', expected YYYY-MM")]
    Malformed(String),
}

/// First month of cost history the lake keeps carbon records for.
pub const DEFAULT_BACKFILL_START: YearMonth = YearMonth {
    year: 2022,
    month: 1,
};

/// A calendar month. Ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Result<Self, ScheduleError> {
        if !(1..=9999).contains(&year) || !(1..=12).contains(&month) {
            return Err(ScheduleError::InvalidMonth { year, month });
        }
        Ok(Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn previous(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    pub fn first_day(&self) -> NaiveDate {
        // year and month are validated on construction
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or_default()
    }

    /// `YYYYMM01`, the partition value for a monthly object.
    pub fn billing_period(&self) -> String {
        format!("{:04}{:02}01", self.year, self.month)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ScheduleError::Malformed(s.to_string());
        let (year, month) = s.trim().split_once('-').ok_or_else(malformed)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(malformed());
        }
        let year = year.parse().map_err(|_| malformed())?;
        let month = month.parse().map_err(|_| malformed())?;
        YearMonth::new(year, month)
    }
}

impl TryFrom<String> for YearMonth {
    type Error = ScheduleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<YearMonth> for String {
    fn from(value: YearMonth) -> Self {
        value.to_string()
    }
}

/// Months the emissions API can serve: `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawWindow")]
pub struct ApiWindow {
    start: YearMonth,
    end: YearMonth,
}

#[derive(Deserialize)]
struct RawWindow {
    start: YearMonth,
    end: YearMonth,
}

impl TryFrom<RawWindow> for ApiWindow {
    type Error = ScheduleError;

    fn try_from(raw: RawWindow) -> Result<Self, Self::Error> {
        ApiWindow::new(raw.start, raw.end)
    }
}

impl ApiWindow {
    pub fn new(start: YearMonth, end: YearMonth) -> Result<Self, ScheduleError> {
        if start > end {
            return Err(ScheduleError::InvertedWindow { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> YearMonth {
        self.start
    }

    pub fn end(&self) -> YearMonth {
        self.end
    }

    pub fn contains(&self, month: YearMonth) -> bool {
        self.start <= month && month < self.end
    }

    /// Last month the API serves. For an empty window this is `start`.
    pub fn last_available(&self) -> YearMonth {
        if self.start == self.end {
            self.start
        } else {
            self.end.previous()
        }
    }

    /// Moves `month` into the window: later months become the last available
    /// month, earlier months become the window start.
    pub fn clamp(&self, month: YearMonth) -> YearMonth {
        if month < self.start {
            self.start
        } else if month > self.last_available() {
            self.last_available()
        } else {
            month
        }
    }
}

impl Default for ApiWindow {
    fn default() -> Self {
        Self {
            start: YearMonth {
                year: 2024,
                month: 6,
            },
            end: YearMonth {
                year: 2025,
                month: 6,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlannedMonth {
    pub month: YearMonth,
    pub in_window: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MonthPlan {
    pub months: Vec<PlannedMonth>,
}

impl MonthPlan {
    pub fn len(&self) -> usize {
        self.months.len()
    }

    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }

    pub fn in_window_count(&self) -> usize {
        self.months.iter().filter(|m| m.in_window).count()
    }

    pub fn out_of_window_count(&self) -> usize {
        self.len() - self.in_window_count()
    }
}

/// Every month from `fixed_start` up to, not including, `window.end()`.
///
/// Months before `window.start()` are out of window. A start at or after the
/// window end yields an empty plan.
pub fn plan(fixed_start: YearMonth, window: &ApiWindow) -> MonthPlan {
    let mut months = Vec::new();
    let mut current = fixed_start;
    while current < window.end() {
        months.push(PlannedMonth {
            month: current,
            in_window: current >= window.start(),
        });
        current = current.next();
    }
    MonthPlan { months }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ym(year: i32, month: u32) -> YearMonth {
        YearMonth::new(year, month).unwrap()
    }

    #[test]
    fn december_wraps_to_january() {
        assert_eq!(ym(2023, 12).next(), ym(2024, 1));
        assert_eq!(ym(2024, 1).previous(), ym(2023, 12));
    }

    #[test]
    fn parses_and_displays_year_month() {
        let month: YearMonth = "2024-06".parse().unwrap();
        assert_eq!(month, ym(2024, 6));
        assert_eq!(month.to_string(), "2024-06");
        assert!("2024-6".parse::<YearMonth>().is_err());
        assert!("2024-13".parse::<YearMonth>().is_err());
    }

    #[test]
    fn clamp_moves_month_into_window() {
        let window = ApiWindow::new(ym(2024, 6), ym(2025, 6)).unwrap();
        assert_eq!(window.clamp(ym(2025, 9)), ym(2025, 5));
        assert_eq!(window.clamp(ym(2023, 1)), ym(2024, 6));
        assert_eq!(window.clamp(ym(2024, 11)), ym(2024, 11));
    }

    #[test]
    fn inverted_window_is_rejected() {
        assert!(ApiWindow::new(ym(2025, 6), ym(2024, 6)).is_err());
    }
}
