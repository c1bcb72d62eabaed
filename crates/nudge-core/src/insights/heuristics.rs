//! Deterministic insight rules over report aggregates

use serde_json::json;

use crate::aggregate::ExpenseRow;
use crate::classify::{matches_any, DELIVERY_TERMS, SUBSCRIPTION_TERMS};
use crate::config::PolicyConfig;
use crate::models::Severity;
use crate::text::{fold, money, percent};

use super::{InsightContext, InsightLine};

/// A single heuristic producing at most one line
pub trait Heuristic: Send + Sync {
    /// Identifier used in logs
    fn name(&self) -> &'static str;

    fn evaluate(&self, ctx: &InsightContext<'_>) -> Option<InsightLine>;
}

/// Built-in heuristics in priority order
///
/// When model lines take slots, the tail of this list is what gets cut.
pub fn default_heuristics(policy: &PolicyConfig) -> Vec<Box<dyn Heuristic>> {
    vec![
        Box::new(OverviewHeuristic),
        Box::new(TrendHeuristic),
        Box::new(ForecastHeuristic),
        Box::new(TopCategoryHeuristic {
            concern_pct: policy.top_category_concern_pct,
        }),
        Box::new(OutlierHeuristic),
        Box::new(SubscriptionHeuristic {
            materiality: policy.subscription_materiality,
        }),
        Box::new(DeliveryHeuristic {
            min_share_pct: policy.delivery_share_pct,
        }),
    ]
}

/// Total spend for the month
pub struct OverviewHeuristic;

impl Heuristic for OverviewHeuristic {
    fn name(&self) -> &'static str {
        "overview"
    }

    fn evaluate(&self, ctx: &InsightContext<'_>) -> Option<InsightLine> {
        let current = ctx.current;
        let body = if current.expense > 0.0 {
            format!(
                "You spent {} in {} across {} expenses.",
                money(current.expense),
                ctx.period,
                current.expense_rows.len()
            )
        } else {
            format!("No spending recorded for {} yet.", ctx.period)
        };

        Some(
            InsightLine::rule("overview", Severity::Info, "Monthly spending".into(), body)
                .with_metadata(json!({
                    "expense": current.expense,
                    "income": current.income,
                    "count": current.expense_rows.len(),
                })),
        )
    }
}

/// Month-over-month direction of spend
pub struct TrendHeuristic;

impl Heuristic for TrendHeuristic {
    fn name(&self) -> &'static str {
        "trend"
    }

    fn evaluate(&self, ctx: &InsightContext<'_>) -> Option<InsightLine> {
        let Some(pct) = ctx.delta_percent else {
            return Some(InsightLine::rule(
                "trend",
                Severity::Info,
                "No baseline yet".into(),
                "There is no spending in the previous month to compare against.".into(),
            ));
        };

        let previous = ctx.previous.expense;
        let current = ctx.current.expense;
        let metadata = json!({ "delta": ctx.delta, "delta_percent": pct });

        let line = if pct >= ctx.spike_threshold {
            InsightLine::rule(
                "spending_spike",
                Severity::Warning,
                format!("Spending up {} vs last month", percent(pct)),
                format!(
                    "You spent {} more than last month ({} vs {}).",
                    money(ctx.delta),
                    money(current),
                    money(previous)
                ),
            )
        } else if pct >= 0.05 {
            InsightLine::rule(
                "trend",
                Severity::Info,
                "Spending increased".into(),
                format!(
                    "Spending rose {} compared to last month ({} vs {}).",
                    percent(pct),
                    money(current),
                    money(previous)
                ),
            )
        } else if pct <= -0.05 {
            InsightLine::rule(
                "trend",
                Severity::Success,
                "Spending decreased".into(),
                format!(
                    "Spending fell {} compared to last month, {} less.",
                    percent(pct.abs()),
                    money(ctx.delta.abs())
                ),
            )
        } else {
            InsightLine::rule(
                "trend",
                Severity::Info,
                "Spending stable".into(),
                format!("Spending is in line with last month at {}.", money(current)),
            )
        };

        Some(line.with_metadata(metadata))
    }
}

/// Largest category and whether it dominates the month
pub struct TopCategoryHeuristic {
    pub concern_pct: f64,
}

impl Heuristic for TopCategoryHeuristic {
    fn name(&self) -> &'static str {
        "top_category"
    }

    fn evaluate(&self, ctx: &InsightContext<'_>) -> Option<InsightLine> {
        let top = ctx.current.top_category()?;
        if top.total <= 0.0 {
            return None;
        }

        let metadata = json!({ "category": top.category, "share_pct": top.share_pct });
        let line = if top.share_pct >= self.concern_pct {
            InsightLine::rule(
                "top_category",
                Severity::Warning,
                format!("{} dominates your spending", top.category),
                format!(
                    "{} takes {} of the month ({}). Consider setting a limit for it.",
                    top.category,
                    percent(top.share_pct),
                    money(top.total)
                ),
            )
        } else {
            InsightLine::rule(
                "top_category",
                Severity::Info,
                format!("Top category: {}", top.category),
                format!(
                    "{} was your largest category with {} ({}).",
                    top.category,
                    money(top.total),
                    percent(top.share_pct)
                ),
            )
        };
        Some(line.with_metadata(metadata))
    }
}

/// The single largest expense
pub struct OutlierHeuristic;

impl Heuristic for OutlierHeuristic {
    fn name(&self) -> &'static str {
        "outlier"
    }

    fn evaluate(&self, ctx: &InsightContext<'_>) -> Option<InsightLine> {
        let row = ctx.current.largest_expense()?;
        let share = if ctx.current.expense > 0.0 {
            row.amount / ctx.current.expense * 100.0
        } else {
            0.0
        };
        let label = if row.description.trim().is_empty() {
            row.category.as_str()
        } else {
            row.description.trim()
        };

        Some(
            InsightLine::rule(
                "outlier",
                Severity::Info,
                "Largest expense".into(),
                format!(
                    "Your largest expense was {} on {}: {} ({} of the month).",
                    label,
                    row.date.format("%d/%m"),
                    money(row.amount),
                    percent(share)
                ),
            )
            .with_metadata(json!({ "id": row.id, "amount": row.amount, "source": row.source })),
        )
    }
}

/// Streaming and cloud-service charges
pub struct SubscriptionHeuristic {
    pub materiality: f64,
}

impl Heuristic for SubscriptionHeuristic {
    fn name(&self) -> &'static str {
        "subscriptions"
    }

    fn evaluate(&self, ctx: &InsightContext<'_>) -> Option<InsightLine> {
        let (total, count) = sum_matching(&ctx.current.expense_rows, |row| {
            row.category == "Subscriptions" || matches_any(&fold(&row.description), SUBSCRIPTION_TERMS)
        });
        if count == 0 || total < self.materiality {
            return None;
        }

        Some(
            InsightLine::rule(
                "subscriptions",
                Severity::Info,
                "Recurring subscriptions".into(),
                format!(
                    "Streaming and cloud services add up to {} this month across {} charges. Cancel the ones you no longer use.",
                    money(total),
                    count
                ),
            )
            .with_metadata(json!({ "total": total, "count": count })),
        )
    }
}

/// Delivery and eating out as a share of spend
pub struct DeliveryHeuristic {
    pub min_share_pct: f64,
}

impl Heuristic for DeliveryHeuristic {
    fn name(&self) -> &'static str {
        "delivery"
    }

    fn evaluate(&self, ctx: &InsightContext<'_>) -> Option<InsightLine> {
        let expense = ctx.current.expense;
        if expense <= 0.0 {
            return None;
        }
        let (total, count) = sum_matching(&ctx.current.expense_rows, |row| {
            matches_any(&fold(&row.description), DELIVERY_TERMS)
        });
        let share = total / expense * 100.0;
        if count == 0 || share < self.min_share_pct {
            return None;
        }

        Some(
            InsightLine::rule(
                "delivery",
                Severity::Warning,
                "Delivery and eating out".into(),
                format!(
                    "Delivery and restaurants took {} of your spending ({}). Cooking at home a few more days would help.",
                    percent(share),
                    money(total)
                ),
            )
            .with_metadata(json!({ "total": total, "share_pct": share, "count": count })),
        )
    }
}

/// Projected month-end balance
pub struct ForecastHeuristic;

impl Heuristic for ForecastHeuristic {
    fn name(&self) -> &'static str {
        "forecast"
    }

    fn evaluate(&self, ctx: &InsightContext<'_>) -> Option<InsightLine> {
        if ctx.current.income <= 0.0 && ctx.current.expense <= 0.0 {
            return None;
        }
        let f = ctx.forecast;
        let body = format!(
            "Projected for month end: income {}, expenses {}, net {}.",
            money(f.income),
            money(f.expense),
            money(f.net)
        );
        let line = if f.is_negative() {
            InsightLine::rule(
                "forecast",
                Severity::Critical,
                "Month heading for a deficit".into(),
                body,
            )
        } else {
            InsightLine::rule(
                "forecast",
                Severity::Success,
                "Month on track".into(),
                body,
            )
        };
        Some(line.with_metadata(json!(f)))
    }
}

fn sum_matching(rows: &[ExpenseRow], pred: impl Fn(&ExpenseRow) -> bool) -> (f64, usize) {
    rows.iter()
        .filter(|row| pred(row))
        .fold((0.0, 0), |(total, count), row| (total + row.amount, count + 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{summarize, Aggregate};
    use crate::forecast::Forecast;
    use crate::models::{EntryKind, LedgerEntry};
    use crate::period::MonthPeriod;
    use chrono::NaiveDate;

    fn entry(id: i64, kind: EntryKind, description: &str, amount: f64) -> LedgerEntry {
        LedgerEntry {
            id,
            user_id: "u1".into(),
            occurred_at: NaiveDate::from_ymd_opt(2024, 5, 1 + (id as u32 % 28)).unwrap(),
            kind,
            description: description.into(),
            category: None,
            amount,
            card_id: None,
            tags: vec![],
        }
    }

    fn ctx<'a>(
        current: &'a Aggregate,
        previous: &'a Aggregate,
        forecast: &'a Forecast,
    ) -> InsightContext<'a> {
        let delta = current.expense - previous.expense;
        InsightContext {
            period: MonthPeriod::parse("2024-05").unwrap(),
            current,
            previous,
            delta,
            delta_percent: (previous.expense > 0.0).then(|| delta / previous.expense * 100.0),
            forecast,
            spike_threshold: 20.0,
        }
    }

    #[test]
    fn test_trend_spike_at_twenty_five_percent() {
        let current = summarize(&[entry(1, EntryKind::Expense, "Compra", 1000.0)], &[]);
        let previous = summarize(&[entry(2, EntryKind::Expense, "Compra", 800.0)], &[]);
        let forecast = Forecast::from_days(31, 31, 0.0, 1000.0);
        let c = ctx(&current, &previous, &forecast);
        assert_eq!(c.delta, 200.0);
        assert_eq!(c.delta_percent, Some(25.0));

        let line = TrendHeuristic.evaluate(&c).unwrap();
        assert_eq!(line.insight_type, "spending_spike");
        assert_eq!(line.severity, Severity::Warning);
        assert!(line.title.contains("25%"));
    }

    #[test]
    fn test_trend_without_baseline() {
        let current = summarize(&[entry(1, EntryKind::Expense, "Compra", 50.0)], &[]);
        let previous = Aggregate::default();
        let forecast = Forecast::from_days(31, 31, 0.0, 50.0);
        let line = TrendHeuristic
            .evaluate(&ctx(&current, &previous, &forecast))
            .unwrap();
        assert_eq!(line.title, "No baseline yet");
    }

    #[test]
    fn test_trend_decrease_is_success() {
        let current = summarize(&[entry(1, EntryKind::Expense, "Compra", 600.0)], &[]);
        let previous = summarize(&[entry(2, EntryKind::Expense, "Compra", 800.0)], &[]);
        let forecast = Forecast::from_days(31, 31, 0.0, 600.0);
        let line = TrendHeuristic
            .evaluate(&ctx(&current, &previous, &forecast))
            .unwrap();
        assert_eq!(line.severity, Severity::Success);
        assert!(line.body.contains("25%"));
    }

    #[test]
    fn test_top_category_concern_threshold() {
        let current = summarize(
            &[
                entry(1, EntryKind::Expense, "Posto Shell", 400.0),
                entry(2, EntryKind::Expense, "Farmacia", 300.0),
                entry(3, EntryKind::Expense, "Livraria", 300.0),
            ],
            &[],
        );
        let previous = Aggregate::default();
        let forecast = Forecast::from_days(31, 31, 0.0, 1000.0);
        let c = ctx(&current, &previous, &forecast);

        let flagged = TopCategoryHeuristic { concern_pct: 35.0 }.evaluate(&c).unwrap();
        assert_eq!(flagged.severity, Severity::Warning);
        assert!(flagged.title.contains("Transport"));

        let calm = TopCategoryHeuristic { concern_pct: 50.0 }.evaluate(&c).unwrap();
        assert_eq!(calm.severity, Severity::Info);
    }

    #[test]
    fn test_subscription_materiality_gate() {
        let current = summarize(
            &[
                entry(1, EntryKind::Expense, "Netflix.com", 39.9),
                entry(2, EntryKind::Expense, "Spotify", 21.9),
                entry(3, EntryKind::Expense, "Aluguel", 1500.0),
            ],
            &[],
        );
        let previous = Aggregate::default();
        let forecast = Forecast::from_days(31, 31, 0.0, current.expense);
        let c = ctx(&current, &previous, &forecast);

        let line = SubscriptionHeuristic { materiality: 30.0 }.evaluate(&c).unwrap();
        assert!(line.body.contains("R$ 61.80"));
        assert!(SubscriptionHeuristic { materiality: 100.0 }.evaluate(&c).is_none());
    }

    #[test]
    fn test_delivery_share_gate() {
        let current = summarize(
            &[
                entry(1, EntryKind::Expense, "iFood *Pedido", 70.0),
                entry(2, EntryKind::Expense, "Aluguel", 930.0),
            ],
            &[],
        );
        let previous = Aggregate::default();
        let forecast = Forecast::from_days(31, 31, 0.0, 1000.0);
        let c = ctx(&current, &previous, &forecast);

        // 7% is below the 8% gate
        assert!(DeliveryHeuristic { min_share_pct: 8.0 }.evaluate(&c).is_none());
        assert!(DeliveryHeuristic { min_share_pct: 5.0 }.evaluate(&c).is_some());
    }

    #[test]
    fn test_forecast_severity_by_sign() {
        let current = summarize(
            &[
                entry(1, EntryKind::Income, "Salario", 1000.0),
                entry(2, EntryKind::Expense, "Compra", 1500.0),
            ],
            &[],
        );
        let previous = Aggregate::default();
        let negative = Forecast::from_days(30, 10, current.income, current.expense);
        let line = ForecastHeuristic
            .evaluate(&ctx(&current, &previous, &negative))
            .unwrap();
        assert_eq!(line.severity, Severity::Critical);
        assert!(line.body.contains("R$ -1500.00"));

        let positive = Forecast::from_days(30, 10, 2000.0, 1500.0);
        let line = ForecastHeuristic
            .evaluate(&ctx(&current, &previous, &positive))
            .unwrap();
        assert_eq!(line.severity, Severity::Success);
    }

    #[test]
    fn test_empty_months_get_overview_and_no_baseline() {
        let empty = Aggregate::default();
        let forecast = Forecast::from_days(31, 1, 0.0, 0.0);
        let c = ctx(&empty, &empty, &forecast);
        let lines: Vec<_> = default_heuristics(&PolicyConfig::default())
            .iter()
            .filter_map(|h| h.evaluate(&c))
            .collect();
        let types: Vec<_> = lines.iter().map(|l| l.insight_type).collect();
        assert_eq!(types, vec!["overview", "trend"]);
        assert_eq!(lines[1].title, "No baseline yet");
    }
}
