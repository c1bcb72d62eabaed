//! Month-end projection
//!
//! Scales month-to-date totals linearly by `days_in_month / days_elapsed`.

use chrono::NaiveDate;
use serde::Serialize;

use crate::period::MonthPeriod;

/// Projected month-end totals
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Forecast {
    pub days_in_month: u32,
    pub days_elapsed: u32,
    pub income: f64,
    pub expense: f64,
    pub net: f64,
}

impl Forecast {
    /// Project month-to-date totals for `period` as of `today`
    pub fn project(period: MonthPeriod, today: NaiveDate, income: f64, expense: f64) -> Self {
        Self::from_days(period.days_in_month(), period.days_elapsed(today), income, expense)
    }

    pub fn from_days(days_in_month: u32, days_elapsed: u32, income: f64, expense: f64) -> Self {
        let factor = days_in_month as f64 / days_elapsed.max(1) as f64;
        let income = income * factor;
        let expense = expense * factor;
        Self {
            days_in_month,
            days_elapsed,
            income,
            expense,
            net: income - expense,
        }
    }

    pub fn is_negative(&self) -> bool {
        self.net < 0.0
    }
}
