//! Relationship/Health Scorer
//!
//! Computes a weighted 0-100 score from five pillars over a user's active
//! cards, the trailing 90 days of ledger activity and active investment
//! positions:
//!
//! | Pillar | Weight |
//! |--------|--------|
//! | Punctuality | 0.30 |
//! | Limit usage | 0.25 |
//! | Investments | 0.15 |
//! | History | 0.15 |
//! | Spending control | 0.15 |
//!
//! Alongside the snapshot it produces rule-based recommendations, optional
//! model recommendations and candidate risk alerts. The billing summaries
//! and positions it loaded are handed back so the event rules reuse the
//! same snapshot of the data.

mod advice;
mod pillars;

pub use advice::{
    recommendations, risk_alerts, LIMIT_CRITICAL_PCT, LIMIT_HIGH_PCT, SCORE_DROP_POINTS,
    SPENDING_SPIKE_GROWTH_PCT,
};
pub use pillars::{
    compute_indicators, history, investments, limit_usage, overall, pillar_scores, punctuality,
    spending_control, Indicators, WEIGHTS, WINDOW_DAYS,
};

use std::fmt::Write;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::{debug, warn};

use crate::ai::{complete_lines, AIClient};
use crate::billing::{activity_since, summarize_card, BillingSummary};
use crate::config::PolicyConfig;
use crate::db::Database;
use crate::error::{DegradedReason, Result};
use crate::models::{
    AutomationEvent, Card, EntryKind, InvestmentPosition, LedgerEntry, PillarScores,
    RelationshipScoreSnapshot, RiskLevel,
};
use crate::period::{DateRange, MonthPeriod};

const ALL_KINDS: [EntryKind; 5] = [
    EntryKind::Income,
    EntryKind::Expense,
    EntryKind::Adjustment,
    EntryKind::CardPayment,
    EntryKind::Transfer,
];

const SYSTEM_PROMPT: &str = "You are a personal finance coach. \
Reply with at most three short, concrete actions, one per line, no preamble.";

/// Everything the scorer produced for one user and day
#[derive(Debug, Clone)]
pub struct ScoreOutcome {
    pub snapshot: RelationshipScoreSnapshot,
    pub indicators: Indicators,
    pub risk_alerts: Vec<AutomationEvent>,
    pub billing: Vec<BillingSummary>,
    pub positions: Vec<InvestmentPosition>,
    pub warnings: Vec<String>,
}

/// Raw reads behind a score
struct ScoreInputs {
    cards: Vec<Card>,
    card_activity: Vec<LedgerEntry>,
    entries: Vec<LedgerEntry>,
    positions: Vec<InvestmentPosition>,
    previous: Option<RelationshipScoreSnapshot>,
    warnings: Vec<String>,
}

/// Computes relationship score snapshots
pub struct Scorer<'a> {
    db: &'a Database,
    ai: Option<&'a AIClient>,
    policy: &'a PolicyConfig,
}

impl<'a> Scorer<'a> {
    pub fn new(db: &'a Database, ai: Option<&'a AIClient>, policy: &'a PolicyConfig) -> Self {
        Self { db, ai, policy }
    }

    /// Score `user_id` as of `today`; nothing is written
    pub async fn compute(
        &self,
        user_id: &str,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<ScoreOutcome> {
        let inputs = self.load_inputs(user_id, today).await?;

        let billing: Vec<BillingSummary> = inputs
            .cards
            .iter()
            .map(|card| summarize_card(card, &inputs.card_activity, today))
            .collect();

        let indicators = compute_indicators(
            &inputs.cards,
            &billing,
            &inputs.entries,
            &inputs.positions,
            today,
        );
        let pillars = pillar_scores(&indicators);
        let score = overall(&pillars);
        let risk_level = RiskLevel::from_score(score);
        let recs = recommendations(&indicators, &pillars, self.policy.max_recommendations);

        let mut warnings = inputs.warnings;
        let (model_recs, degraded) = complete_lines(
            self.ai,
            SYSTEM_PROMPT,
            &build_prompt(score, risk_level, &pillars, &indicators),
            self.policy.max_model_lines,
        )
        .await;
        if let Some(reason) = degraded {
            warnings.push(reason.as_warning("model recommendations"));
        }
        let model_recs = advice::dedup_folded(model_recs, self.policy.max_model_lines);

        let previous_score = inputs.previous.as_ref().map(|s| s.score);
        let risk_alerts = risk_alerts(&indicators, score, previous_score);

        debug!(
            user_id = user_id,
            score = score,
            previous = ?previous_score,
            alerts = risk_alerts.len(),
            "Score computed"
        );

        let snapshot = RelationshipScoreSnapshot {
            user_id: user_id.to_string(),
            reference_date: today,
            month_ref: MonthPeriod::containing(today).key(),
            score,
            pillars,
            risk_level,
            recommendations: recs,
            model_recommendations: model_recs,
            indicators: serde_json::to_value(&indicators)?,
            updated_at: now,
        };

        Ok(ScoreOutcome {
            snapshot,
            indicators,
            risk_alerts,
            billing,
            positions: inputs.positions,
            warnings,
        })
    }

    /// Cards, ledger window, positions and the previous snapshot, read concurrently
    async fn load_inputs(&self, user_id: &str, today: NaiveDate) -> Result<ScoreInputs> {
        let window = DateRange {
            start: today - Duration::days(WINDOW_DAYS - 1),
            end_exclusive: today + Duration::days(1),
        };
        let since = activity_since(today);

        let (cards, card_activity, entries, positions, previous) = tokio::try_join!(
            blocking(self.db, user_id, |db, user| db.list_active_cards(user)),
            blocking(self.db, user_id, move |db, user| {
                db.list_card_activity(user, since)
            }),
            blocking(self.db, user_id, move |db, user| {
                db.list_ledger_entries(user, window, &ALL_KINDS)
            }),
            blocking(self.db, user_id, |db, user| {
                match db.list_active_investments(user) {
                    Ok(positions) => Ok(Ok(positions)),
                    Err(e) if e.is_missing_table() => {
                        Ok(Err(DegradedReason::MissingTable("investments".to_string())))
                    }
                    Err(e) => Err(e),
                }
            }),
            blocking(self.db, user_id, move |db, user| {
                db.previous_score_snapshot(user, today)
            }),
        )?;

        let mut warnings = Vec::new();
        let positions = positions.unwrap_or_else(|reason| {
            warn!(user_id = user_id, reason = %reason, "Scoring without investments");
            warnings.push(reason.as_warning("investment positions"));
            Vec::new()
        });

        Ok(ScoreInputs {
            cards,
            card_activity,
            entries,
            positions,
            previous,
            warnings,
        })
    }
}

async fn blocking<T, F>(db: &Database, user_id: &str, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&Database, &str) -> Result<T> + Send + 'static,
{
    let db = db.clone();
    let user_id = user_id.to_string();
    tokio::task::spawn_blocking(move || f(&db, &user_id)).await?
}

fn build_prompt(
    score: u8,
    risk: RiskLevel,
    pillars: &PillarScores,
    ind: &Indicators,
) -> String {
    let mut prompt = String::new();
    let _ = writeln!(prompt, "Financial health score: {}/100 ({})", score, risk);
    let _ = writeln!(prompt, "Punctuality: {:.0}", pillars.punctuality);
    let _ = writeln!(prompt, "Card limit usage: {:.0}", pillars.limit_usage);
    let _ = writeln!(prompt, "Investments: {:.0}", pillars.investments);
    let _ = writeln!(prompt, "History: {:.0}", pillars.history);
    let _ = writeln!(prompt, "Spending control: {:.0}", pillars.spending_control);
    if let Some(usage) = ind.limit_usage_pct {
        let _ = writeln!(prompt, "Limit used: {:.0}%", usage);
    }
    if let Some(growth) = ind.expense_growth_pct {
        let _ = writeln!(prompt, "Spending growth vs 3-month average: {:.0}%", growth);
    }
    if let Some(rate) = ind.savings_rate_pct {
        let _ = writeln!(prompt, "Savings rate: {:.0}%", rate);
    }
    prompt.push_str("Suggest actions that would raise the weakest pillars.");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockBackend;
    use crate::db::NewCard;
    use crate::models::{InvestmentOperation, NewInvestmentPosition, NewLedgerEntry};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[tokio::test]
    async fn test_empty_user_scores_neutral() {
        let db = Database::in_memory().unwrap();
        let policy = PolicyConfig::default();
        let outcome = Scorer::new(&db, None, &policy)
            .compute("nobody", d(2024, 6, 15), Utc::now())
            .await
            .unwrap();

        let p = outcome.snapshot.pillars;
        assert_eq!(p.limit_usage, 75.0);
        assert_eq!(p.punctuality, 100.0);
        assert_eq!(p.investments, 45.0);
        assert_eq!(p.history, 50.0);
        assert_eq!(p.spending_control, 82.0);
        assert_eq!(outcome.snapshot.score, 75);
        assert_eq!(outcome.snapshot.risk_level, RiskLevel::Good);
        assert_eq!(outcome.snapshot.month_ref, "2024-06");
        assert!(outcome.risk_alerts.is_empty());
        assert!(outcome.snapshot.model_recommendations.is_empty());
    }

    #[tokio::test]
    async fn test_overdue_card_raises_delay_risk() {
        let db = Database::in_memory().unwrap();
        let card = db.insert_card(&NewCard::new("u1", "Visa", 1000.0, 5, 15)).unwrap();
        db.insert_ledger_entry(
            &NewLedgerEntry::new("u1", d(2024, 5, 1), EntryKind::Expense, "Loja", 900.0)
                .with_card(card),
        )
        .unwrap();

        let policy = PolicyConfig::default();
        let outcome = Scorer::new(&db, None, &policy)
            .compute("u1", d(2024, 5, 20), Utc::now())
            .await
            .unwrap();

        assert_eq!(outcome.indicators.overdue_invoices, 1);
        // Open card, no payments: capped at 70, minus 25 for the overdue invoice
        assert_eq!(outcome.snapshot.pillars.punctuality, 45.0);
        assert_eq!(outcome.snapshot.pillars.limit_usage, 20.0);
        let types: Vec<_> = outcome.risk_alerts.iter().map(|a| a.alert_type).collect();
        assert!(types.contains(&crate::models::AlertType::DelayRisk));
        assert!(types.contains(&crate::models::AlertType::LimitHigh));
        assert_eq!(outcome.billing.len(), 1);
    }

    #[tokio::test]
    async fn test_score_drop_against_previous_snapshot() {
        let db = Database::in_memory().unwrap();
        let policy = PolicyConfig::default();
        let scorer = Scorer::new(&db, None, &policy);

        let mut first = scorer.compute("u1", d(2024, 6, 14), Utc::now()).await.unwrap();
        first.snapshot.score = 90;
        db.upsert_score_snapshot(&first.snapshot).unwrap();

        let second = scorer.compute("u1", d(2024, 6, 15), Utc::now()).await.unwrap();
        assert!(second
            .risk_alerts
            .iter()
            .any(|a| a.alert_type == crate::models::AlertType::ScoreDrop));

        // Rescoring the same day replaces the row
        db.upsert_score_snapshot(&second.snapshot).unwrap();
        db.upsert_score_snapshot(&second.snapshot).unwrap();
        assert_eq!(db.count_score_snapshots("u1").unwrap(), 2);
    }

    #[tokio::test]
    async fn test_investments_and_model_recommendations() {
        let db = Database::in_memory().unwrap();
        for (name, amount) in [("Tesouro", 600.0), ("CDB", 500.0), ("ACME3", 300.0)] {
            db.insert_investment(&NewInvestmentPosition {
                user_id: "u1".into(),
                asset_name: name.into(),
                asset_type: "fixed".into(),
                quantity: 1.0,
                current_price: amount,
                average_price: amount,
                invested_amount: amount,
                operation: InvestmentOperation::Buy,
                price_history: vec![],
                updated_at: d(2024, 3, 1),
            })
            .unwrap();
        }

        let policy = PolicyConfig::default();
        let ai = AIClient::Mock(MockBackend::with_reply(
            "1. Increase your monthly contribution\n2. Increase your monthly contribution\n3. Keep a three month emergency fund",
        ));
        let outcome = Scorer::new(&db, Some(&ai), &policy)
            .compute("u1", d(2024, 6, 15), Utc::now())
            .await
            .unwrap();

        assert_eq!(outcome.snapshot.pillars.investments, 100.0);
        assert_eq!(outcome.positions.len(), 3);
        assert_eq!(
            outcome.snapshot.model_recommendations,
            vec![
                "Increase your monthly contribution",
                "Keep a three month emergency fund"
            ]
        );
        assert!(outcome.warnings.is_empty());
    }
}
