//! Calendar month periods keyed as `YYYY-MM`

use std::fmt;
use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::Serialize;

fn month_key_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{4}-(0[1-9]|1[0-2])$").expect("valid regex"))
}

/// One calendar month
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonthPeriod {
    year: i32,
    month: u32,
}

/// A half-open date range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end_exclusive: NaiveDate,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end_exclusive
    }
}

impl MonthPeriod {
    /// The month containing `date`
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Parse a canonical `YYYY-MM` key
    pub fn parse(key: &str) -> Option<Self> {
        let key = key.trim();
        if !month_key_re().is_match(key) {
            return None;
        }
        let (y, m) = key.split_once('-')?;
        Some(Self {
            year: y.parse().ok()?,
            month: m.parse().ok()?,
        })
    }

    /// Parse an optional key, falling back to the month containing `today`
    pub fn parse_or_current(key: Option<&str>, today: NaiveDate) -> Self {
        key.and_then(Self::parse)
            .unwrap_or_else(|| Self::containing(today))
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn key(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }

    pub fn start(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).expect("Day 1 always valid")
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

    pub fn range(&self) -> DateRange {
        DateRange {
            start: self.start(),
            end_exclusive: self.next().start(),
        }
    }

    pub fn days_in_month(&self) -> u32 {
        (self.next().start() - self.start()).num_days() as u32
    }

    /// Days of this month that have elapsed as of `today`
    ///
    /// The current month counts today; past months count every day; future
    /// months count one day so forecasts never divide by zero.
    pub fn days_elapsed(&self, today: NaiveDate) -> u32 {
        let current = Self::containing(today);
        if *self == current {
            today.day()
        } else if *self < current {
            self.days_in_month()
        } else {
            1
        }
    }

    /// The date in this month with `day`, clamped to the month length
    pub fn clamped_day(&self, day: u32) -> NaiveDate {
        let day = day.clamp(1, self.days_in_month());
        NaiveDate::from_ymd_opt(self.year, self.month, day).expect("day clamped to month length")
    }
}

impl Serialize for MonthPeriod {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.key())
    }
}

impl fmt::Display for MonthPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_parse_valid_and_invalid_keys() {
        assert_eq!(MonthPeriod::parse("2024-03").unwrap().key(), "2024-03");
        assert!(MonthPeriod::parse("2024-13").is_none());
        assert!(MonthPeriod::parse("2024-3").is_none());
        assert!(MonthPeriod::parse("march").is_none());
    }

    #[test]
    fn test_invalid_key_falls_back_to_current_month() {
        let today = d(2024, 7, 19);
        let period = MonthPeriod::parse_or_current(Some("2024-00"), today);
        assert_eq!(period.key(), "2024-07");
        assert_eq!(MonthPeriod::parse_or_current(None, today).key(), "2024-07");
    }

    #[test]
    fn test_year_boundaries() {
        let jan = MonthPeriod::parse("2024-01").unwrap();
        assert_eq!(jan.previous().key(), "2023-12");
        let dec = MonthPeriod::parse("2023-12").unwrap();
        assert_eq!(dec.range().end_exclusive, d(2024, 1, 1));
    }

    #[test]
    fn test_days_in_month_and_elapsed() {
        let feb = MonthPeriod::parse("2024-02").unwrap();
        assert_eq!(feb.days_in_month(), 29);
        assert_eq!(feb.days_elapsed(d(2024, 2, 10)), 10);
        assert_eq!(feb.days_elapsed(d(2024, 5, 1)), 29);
        assert_eq!(feb.clamped_day(31), d(2024, 2, 29));
    }
}
