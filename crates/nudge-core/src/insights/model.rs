//! Language-model insight stream

use std::fmt::Write;

use crate::ai::{complete_lines, AIClient};
use crate::error::DegradedReason;
use crate::models::{InsightSource, Severity};
use crate::text::{money, percent};

use super::{InsightContext, InsightLine};

pub const SYSTEM_PROMPT: &str = "You are a personal finance assistant. \
Reply with at most three short, practical tips, one per line, no preamble. \
Refer only to the numbers you are given.";

/// Summarize the month's aggregates for the model
pub fn build_prompt(ctx: &InsightContext<'_>) -> String {
    let mut prompt = String::new();
    let _ = writeln!(prompt, "Month: {}", ctx.period);
    let _ = writeln!(prompt, "Income: {}", money(ctx.current.income));
    let _ = writeln!(prompt, "Expenses: {}", money(ctx.current.expense));
    let _ = writeln!(prompt, "Previous month expenses: {}", money(ctx.previous.expense));
    match ctx.delta_percent {
        Some(pct) => {
            let _ = writeln!(prompt, "Change vs previous month: {}", percent(pct));
        }
        None => {
            let _ = writeln!(prompt, "Change vs previous month: no baseline");
        }
    }
    let _ = writeln!(prompt, "Projected month-end net: {}", money(ctx.forecast.net));

    if !ctx.current.category_totals.is_empty() {
        let _ = writeln!(prompt, "Top categories:");
        for cat in ctx.current.category_totals.iter().take(5) {
            let _ = writeln!(
                prompt,
                "- {}: {} ({})",
                cat.category,
                money(cat.total),
                percent(cat.share_pct)
            );
        }
    }
    prompt.push_str("Give tips to improve next month's balance.");
    prompt
}

pub(super) async fn model_lines(
    ai: Option<&AIClient>,
    ctx: &InsightContext<'_>,
    max_lines: usize,
) -> (Vec<InsightLine>, Option<DegradedReason>) {
    if max_lines == 0 {
        return (Vec::new(), None);
    }
    // Nothing to talk about
    if ctx.current.expense <= 0.0 && ctx.current.income <= 0.0 {
        return (Vec::new(), None);
    }

    let (lines, reason) = complete_lines(ai, SYSTEM_PROMPT, &build_prompt(ctx), max_lines).await;
    let lines = lines
        .into_iter()
        .map(|body| InsightLine {
            insight_type: "model_tip",
            title: "Suggestion".to_string(),
            body,
            severity: Severity::Info,
            source: InsightSource::Model,
            metadata: serde_json::Value::Null,
        })
        .collect();
    (lines, reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::summarize;
    use crate::forecast::Forecast;
    use crate::models::{EntryKind, LedgerEntry};
    use crate::period::MonthPeriod;
    use chrono::NaiveDate;

    #[test]
    fn test_prompt_mentions_aggregates() {
        let current = summarize(
            &[LedgerEntry {
                id: 1,
                user_id: "u1".into(),
                occurred_at: NaiveDate::from_ymd_opt(2024, 5, 3).unwrap(),
                kind: EntryKind::Expense,
                description: "Uber".into(),
                category: None,
                amount: 42.0,
                card_id: None,
                tags: vec![],
            }],
            &[],
        );
        let previous = Default::default();
        let forecast = Forecast::from_days(31, 3, 0.0, 42.0);
        let ctx = InsightContext {
            period: MonthPeriod::parse("2024-05").unwrap(),
            current: &current,
            previous: &previous,
            delta: 42.0,
            delta_percent: None,
            forecast: &forecast,
            spike_threshold: 20.0,
        };

        let prompt = build_prompt(&ctx);
        assert!(prompt.contains("Month: 2024-05"));
        assert!(prompt.contains("Expenses: R$ 42.00"));
        assert!(prompt.contains("no baseline"));
        assert!(prompt.contains("- Transport: R$ 42.00 (100%)"));
    }
}
