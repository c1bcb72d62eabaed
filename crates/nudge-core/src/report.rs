//! Monthly Report Builder
//!
//! Compares a month against the previous one. Both aggregations run
//! concurrently on the blocking pool, then the report derives deltas, the
//! category breakdown with display metadata, the top expenses and a
//! month-end forecast, and asks the Insight Generator for lines.
//!
//! Building a report does not persist insights; the automation run writes
//! them together with the score snapshot.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, warn};

use crate::aggregate::{aggregate_range, Aggregate, CategoryTotal, ExpenseRow};
use crate::ai::AIClient;
use crate::db::Database;
use crate::error::Result;
use crate::forecast::Forecast;
use crate::insights::{InsightContext, InsightGenerator};
use crate::models::InsightRecord;
use crate::period::{DateRange, MonthPeriod};

/// Number of expense rows kept on the report
pub const TOP_EXPENSES: usize = 10;

/// A category total with its display metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryBreakdown {
    pub category: String,
    pub total: f64,
    pub share_pct: f64,
    pub icon: String,
    pub color: String,
}

/// Totals for one side of the comparison
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthTotals {
    pub income: f64,
    pub expense: f64,
}

/// The monthly report for one user
#[derive(Debug, Clone, Serialize)]
pub struct MonthlyReport {
    pub user_id: String,
    pub period: MonthPeriod,
    pub current_range: DateRange,
    pub previous_range: DateRange,
    pub current: MonthTotals,
    pub previous: MonthTotals,
    pub delta: f64,
    /// None when the previous month had no spend
    pub delta_percent: Option<f64>,
    pub top_category: Option<CategoryBreakdown>,
    pub categories: Vec<CategoryBreakdown>,
    pub top_expenses: Vec<ExpenseRow>,
    /// Every current-month expense row, for export
    pub rows: Vec<ExpenseRow>,
    pub forecast: Forecast,
    pub insights: Vec<InsightRecord>,
    pub warnings: Vec<String>,
}

/// Builds monthly reports
pub struct ReportBuilder<'a> {
    db: &'a Database,
    ai: Option<&'a AIClient>,
    generator: &'a InsightGenerator,
}

impl<'a> ReportBuilder<'a> {
    pub fn new(db: &'a Database, ai: Option<&'a AIClient>, generator: &'a InsightGenerator) -> Self {
        Self { db, ai, generator }
    }

    /// Build the report for `month` (a `YYYY-MM` key; invalid or missing
    /// keys fall back to the month containing `today`)
    pub async fn build(
        &self,
        user_id: &str,
        month: Option<&str>,
        today: NaiveDate,
        spike_threshold: f64,
    ) -> Result<MonthlyReport> {
        if let Some(key) = month {
            if MonthPeriod::parse(key).is_none() {
                warn!(user_id = user_id, month = key, "Invalid month key, using current month");
            }
        }
        let period = MonthPeriod::parse_or_current(month, today);
        let current_range = period.range();
        let previous_range = period.previous().range();

        let (current, previous) = tokio::try_join!(
            spawn_aggregate(self.db, user_id, current_range),
            spawn_aggregate(self.db, user_id, previous_range),
        )?;

        let delta = current.expense - previous.expense;
        let delta_percent = (previous.expense > 0.0).then(|| delta / previous.expense * 100.0);
        let forecast = Forecast::project(period, today, current.income, current.expense);

        let categories = spawn_category_breakdown(self.db, current.category_totals.clone()).await?;

        let ctx = InsightContext {
            period,
            current: &current,
            previous: &previous,
            delta,
            delta_percent,
            forecast: &forecast,
            spike_threshold,
        };
        let insight_set = self.generator.generate(user_id, &ctx, self.ai).await;

        let mut warnings = current.warnings.clone();
        for w in previous.warnings.iter().chain(&insight_set.warnings) {
            if !warnings.contains(w) {
                warnings.push(w.clone());
            }
        }

        debug!(
            user_id = user_id,
            period = %period,
            expense = current.expense,
            previous = previous.expense,
            "Monthly report built"
        );

        Ok(MonthlyReport {
            user_id: user_id.to_string(),
            period,
            current_range,
            previous_range,
            current: MonthTotals {
                income: current.income,
                expense: current.expense,
            },
            previous: MonthTotals {
                income: previous.income,
                expense: previous.expense,
            },
            delta,
            delta_percent,
            top_category: categories.first().cloned(),
            categories,
            top_expenses: current.expense_rows.iter().take(TOP_EXPENSES).cloned().collect(),
            rows: current.expense_rows,
            forecast,
            insights: insight_set.records,
            warnings,
        })
    }
}

async fn spawn_aggregate(db: &Database, user_id: &str, range: DateRange) -> Result<Aggregate> {
    let db = db.clone();
    let user_id = user_id.to_string();
    tokio::task::spawn_blocking(move || aggregate_range(&db, &user_id, range)).await?
}

/// Attach display metadata to each category, creating missing entries
async fn spawn_category_breakdown(
    db: &Database,
    totals: Vec<CategoryTotal>,
) -> Result<Vec<CategoryBreakdown>> {
    let db = db.clone();
    tokio::task::spawn_blocking(move || {
        totals
            .into_iter()
            .map(|total| {
                let meta = db.ensure_category_meta(&total.category)?;
                Ok(CategoryBreakdown {
                    category: total.category,
                    total: total.total,
                    share_pct: total.share_pct,
                    icon: meta.icon,
                    color: meta.color,
                })
            })
            .collect::<Result<Vec<_>>>()
    })
    .await?
}
