//! Insight Generator
//!
//! Produces short natural-language lines about one month of activity from
//! two independent streams:
//!
//! - **Heuristics**: deterministic rules over the report aggregates. Always
//!   available.
//! - **Model**: optional language-model lines. Any failure yields an empty
//!   list and a warning, never an error.
//!
//! The streams are merged, deduplicated on folded text and capped, then
//! persisted as a replace-for-key snapshot per `(user, period)`.

mod heuristics;
mod model;

pub use heuristics::{
    default_heuristics, DeliveryHeuristic, ForecastHeuristic, Heuristic, OutlierHeuristic,
    OverviewHeuristic, SubscriptionHeuristic, TopCategoryHeuristic, TrendHeuristic,
};
pub use model::{build_prompt, SYSTEM_PROMPT};

use std::collections::HashSet;

use serde::Serialize;
use tracing::debug;

use crate::aggregate::Aggregate;
use crate::ai::AIClient;
use crate::config::PolicyConfig;
use crate::forecast::Forecast;
use crate::models::{InsightRecord, InsightSource, Severity};
use crate::period::MonthPeriod;
use crate::text::fold;

/// Everything the insight streams look at
pub struct InsightContext<'a> {
    pub period: MonthPeriod,
    pub current: &'a Aggregate,
    pub previous: &'a Aggregate,
    pub delta: f64,
    /// None when the previous month had no spend
    pub delta_percent: Option<f64>,
    pub forecast: &'a Forecast,
    /// Growth percentage the user treats as a spike
    pub spike_threshold: f64,
}

/// One generated line before it is bound to a user and period
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsightLine {
    pub insight_type: &'static str,
    pub title: String,
    pub body: String,
    pub severity: Severity,
    pub source: InsightSource,
    pub metadata: serde_json::Value,
}

impl InsightLine {
    pub fn rule(insight_type: &'static str, severity: Severity, title: String, body: String) -> Self {
        Self {
            insight_type,
            title,
            body,
            severity,
            source: InsightSource::Rule,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    fn into_record(self, user_id: &str, period: &MonthPeriod) -> InsightRecord {
        InsightRecord {
            user_id: user_id.to_string(),
            period: period.key(),
            insight_type: self.insight_type.to_string(),
            title: self.title,
            body: self.body,
            severity: self.severity,
            source: self.source,
            metadata: self.metadata,
        }
    }
}

/// Merged insight lines plus any degradation warnings
#[derive(Debug, Clone, Default, Serialize)]
pub struct InsightSet {
    pub records: Vec<InsightRecord>,
    pub warnings: Vec<String>,
}

/// Runs the heuristic and model streams
pub struct InsightGenerator {
    heuristics: Vec<Box<dyn Heuristic>>,
    max_insights: usize,
    max_model_lines: usize,
}

impl InsightGenerator {
    /// Generator with the built-in heuristics
    pub fn new(policy: &PolicyConfig) -> Self {
        Self {
            heuristics: default_heuristics(policy),
            max_insights: policy.max_insights,
            max_model_lines: policy.max_model_lines,
        }
    }

    /// Heuristic stream, in registration order
    pub fn heuristic_lines(&self, ctx: &InsightContext<'_>) -> Vec<InsightLine> {
        self.heuristics
            .iter()
            .filter_map(|h| {
                let line = h.evaluate(ctx);
                if line.is_none() {
                    debug!(heuristic = h.name(), "Heuristic produced no line");
                }
                line
            })
            .collect()
    }

    /// Run both streams and merge them into records for `user_id`
    pub async fn generate(
        &self,
        user_id: &str,
        ctx: &InsightContext<'_>,
        ai: Option<&AIClient>,
    ) -> InsightSet {
        let heuristic = self.heuristic_lines(ctx);
        let (model, degraded) = model::model_lines(ai, ctx, self.max_model_lines).await;

        let mut warnings = Vec::new();
        if let Some(reason) = degraded {
            warnings.push(reason.as_warning("model insights"));
        }

        let merged = merge_lines(heuristic, model, self.max_insights, self.max_model_lines);
        debug!(
            user_id = user_id,
            period = %ctx.period,
            count = merged.len(),
            "Insight lines merged"
        );

        InsightSet {
            records: merged
                .into_iter()
                .map(|line| line.into_record(user_id, &ctx.period))
                .collect(),
            warnings,
        }
    }
}

/// Merge the two streams
///
/// Both streams are deduplicated on folded body first, heuristics before
/// model lines. Surviving model lines (at most `max_model`) then take their
/// slots, heuristics keep at least three (or the whole cap, if smaller) and
/// the result never exceeds `max_total`.
pub fn merge_lines(
    heuristic: Vec<InsightLine>,
    model: Vec<InsightLine>,
    max_total: usize,
    max_model: usize,
) -> Vec<InsightLine> {
    let mut seen = HashSet::new();
    let heuristic: Vec<_> = heuristic
        .into_iter()
        .filter(|line| seen.insert(fold(&line.body)))
        .collect();
    let model: Vec<_> = model
        .into_iter()
        .filter(|line| seen.insert(fold(&line.body)))
        .take(max_model)
        .collect();

    let heuristic_budget = max_total
        .saturating_sub(model.len())
        .max(max_total.min(3));

    let mut merged: Vec<_> = heuristic.into_iter().take(heuristic_budget).collect();
    let room = max_total.saturating_sub(merged.len());
    merged.extend(model.into_iter().take(room));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::summarize;
    use crate::ai::MockBackend;
    use crate::error::DegradedReason;
    use crate::models::{EntryKind, LedgerEntry};
    use chrono::NaiveDate;

    fn line(body: &str, source: InsightSource) -> InsightLine {
        InsightLine {
            insight_type: "test",
            title: "t".into(),
            body: body.into(),
            severity: Severity::Info,
            source,
            metadata: serde_json::Value::Null,
        }
    }

    fn expense(id: i64, day: u32, description: &str, amount: f64) -> LedgerEntry {
        LedgerEntry {
            id,
            user_id: "u1".into(),
            occurred_at: NaiveDate::from_ymd_opt(2024, 5, day).unwrap(),
            kind: EntryKind::Expense,
            description: description.into(),
            category: None,
            amount,
            card_id: None,
            tags: vec![],
        }
    }

    #[test]
    fn test_merge_dedups_folded_text() {
        let heuristic = vec![
            line("Spend less on delivery", InsightSource::Rule),
            line("Another line here", InsightSource::Rule),
        ];
        let model = vec![
            line("  SPEND less on   DELIVERY ", InsightSource::Model),
            line("Review your subscriptions", InsightSource::Model),
        ];
        let merged = merge_lines(heuristic, model, 6, 3);
        let bodies: Vec<_> = merged.iter().map(|l| l.body.as_str()).collect();
        assert_eq!(
            bodies,
            vec!["Spend less on delivery", "Another line here", "Review your subscriptions"]
        );
    }

    #[test]
    fn test_merge_caps_and_reserves_model_slots() {
        let heuristic: Vec<_> = (0..7)
            .map(|i| line(&format!("heuristic line {}", i), InsightSource::Rule))
            .collect();
        let model: Vec<_> = (0..5)
            .map(|i| line(&format!("model line {}", i), InsightSource::Model))
            .collect();

        let merged = merge_lines(heuristic.clone(), model, 6, 3);
        assert_eq!(merged.len(), 6);
        assert_eq!(
            merged.iter().filter(|l| l.source == InsightSource::Model).count(),
            3
        );

        // Without model lines heuristics fill the whole cap
        let merged = merge_lines(heuristic, vec![], 6, 3);
        assert_eq!(merged.len(), 6);
        assert!(merged.iter().all(|l| l.source == InsightSource::Rule));
    }

    #[test]
    fn test_merge_repeated_model_lines_leave_room_for_heuristics() {
        let heuristic: Vec<_> = (0..7)
            .map(|i| line(&format!("heuristic line {}", i), InsightSource::Rule))
            .collect();
        let model: Vec<_> = (0..3)
            .map(|i| line(&format!("HEURISTIC  line {}", i), InsightSource::Model))
            .collect();

        let merged = merge_lines(heuristic, model, 6, 3);
        let bodies: Vec<_> = merged.iter().map(|l| l.body.as_str()).collect();
        assert_eq!(
            bodies,
            (0..6).map(|i| format!("heuristic line {}", i)).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_merge_dedups_within_heuristics() {
        let heuristic = vec![
            line("Same line", InsightSource::Rule),
            line("same LINE", InsightSource::Rule),
            line("Other line", InsightSource::Rule),
        ];
        let model = vec![line("Model line", InsightSource::Model)];
        let merged = merge_lines(heuristic, model, 6, 3);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[2].source, InsightSource::Model);
    }

    #[test]
    fn test_merge_empty_is_empty() {
        assert!(merge_lines(vec![], vec![], 6, 3).is_empty());
    }

    #[tokio::test]
    async fn test_generate_degrades_without_model() {
        let current = summarize(
            &[expense(1, 2, "IFOOD pedido", 120.0), expense(2, 3, "Netflix", 55.9)],
            &[],
        );
        let previous = summarize(&[expense(3, 4, "Mercado", 100.0)], &[]);
        let period = MonthPeriod::parse("2024-05").unwrap();
        let forecast = Forecast::from_days(31, 31, 0.0, current.expense);
        let ctx = InsightContext {
            period,
            current: &current,
            previous: &previous,
            delta: current.expense - previous.expense,
            delta_percent: Some((current.expense - previous.expense) / previous.expense * 100.0),
            forecast: &forecast,
            spike_threshold: 20.0,
        };

        let generator = InsightGenerator::new(&PolicyConfig::default());
        let set = generator.generate("u1", &ctx, None).await;
        assert!(!set.records.is_empty());
        assert!(set.records.len() <= 6);
        assert!(set.records.iter().all(|r| r.source == InsightSource::Rule));
        assert!(set.records.iter().all(|r| r.period == "2024-05"));
        assert_eq!(set.warnings.len(), 1);

        let failing = AIClient::Mock(MockBackend::failing(DegradedReason::Status(502)));
        let set = generator.generate("u1", &ctx, Some(&failing)).await;
        assert!(set.warnings[0].contains("502"));

        let healthy = AIClient::mock();
        let set = generator.generate("u1", &ctx, Some(&healthy)).await;
        assert!(set.warnings.is_empty());
        assert!(set.records.iter().any(|r| r.source == InsightSource::Model));
    }
}
