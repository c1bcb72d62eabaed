//! Automation Event Engine
//!
//! One run per user:
//!
//! 1. Classifier backfill (bounded; a failure is only a warning)
//! 2. Monthly report and relationship score, concurrently
//! 3. Insight and score snapshots written in one transaction
//! 4. Threshold rules plus the scorer's risk alerts, deduplicated in-run
//! 5. Notification fan-out
//!
//! A store failure in steps 2-3 aborts the run, records `last_status =
//! error` on the user's settings and leaves earlier snapshots in place;
//! no partial snapshot from the failed run is visible.
//! Provider failures (model, FX, push, email) never abort; they show up in
//! [`RunReport::warnings`].
//!
//! [`AutomationEngine::run_all`] visits every known user with a bounded
//! number of runs in flight.

pub mod rules;

pub use rules::{dedup_exact, evaluate, RuleInputs};

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::ai::AIClient;
use crate::classify::{backfill_categories, BackfillReport};
use crate::config::EngineConfig;
use crate::db::Database;
use crate::error::{DegradedReason, Result};
use crate::fx::FxClient;
use crate::insights::InsightGenerator;
use crate::models::{
    AutomationEvent, AutomationSettings, RelationshipScoreSnapshot, RiskLevel, RunStatus,
};
use crate::notify::{DigestSummary, FanoutReport, Notifier};
use crate::period::MonthPeriod;
use crate::report::{MonthlyReport, ReportBuilder};
use crate::score::Scorer;

/// Outcome of one successful user run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub user_id: String,
    pub period: MonthPeriod,
    pub backfill: Option<BackfillReport>,
    pub insights_written: usize,
    pub score: u8,
    pub risk_level: RiskLevel,
    pub fx_quote: Option<f64>,
    /// Candidate events after the in-run dedup
    pub events: Vec<AutomationEvent>,
    pub fanout: FanoutReport,
    pub warnings: Vec<String>,
}

/// Outcome of a batch run
#[derive(Debug, Default)]
pub struct BatchReport {
    pub completed: Vec<RunReport>,
    /// `(user_id, error)` for runs that aborted
    pub failed: Vec<(String, String)>,
}

/// Runs the per-user automation pipeline
#[derive(Clone)]
pub struct AutomationEngine {
    db: Database,
    config: EngineConfig,
    ai: Option<AIClient>,
    fx: Option<FxClient>,
    notifier: Notifier,
    generator: Arc<InsightGenerator>,
}

impl AutomationEngine {
    /// Engine with providers built from `config` and the AI environment
    pub fn new(db: Database, config: EngineConfig) -> Self {
        let timeout = Duration::from_secs(config.policy.http_timeout_secs);
        let ai = AIClient::from_env(timeout);
        if ai.is_none() {
            debug!("No language model configured, model insights disabled");
        }
        Self {
            ai,
            fx: FxClient::from_config(&config.providers, timeout),
            notifier: Notifier::from_config(&config),
            generator: Arc::new(InsightGenerator::new(&config.policy)),
            db,
            config,
        }
    }

    pub fn with_ai(mut self, ai: Option<AIClient>) -> Self {
        self.ai = ai;
        self
    }

    pub fn with_fx(mut self, fx: Option<FxClient>) -> Self {
        self.fx = fx;
        self
    }

    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run now for one user ("run now" entry point)
    pub async fn run_user(&self, user_id: &str, month: Option<&str>) -> Result<RunReport> {
        self.run_user_at(user_id, month, Utc::now()).await
    }

    /// Run for one user as of `now`, recording the outcome on their settings
    pub async fn run_user_at(
        &self,
        user_id: &str,
        month: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<RunReport> {
        match self.execute(user_id, month, now).await {
            Ok(report) => {
                self.db
                    .record_run_status(user_id, RunStatus::Ok, None, now)?;
                info!(
                    user_id = user_id,
                    period = %report.period,
                    score = report.score,
                    events = report.events.len(),
                    warnings = report.warnings.len(),
                    "Automation run finished"
                );
                Ok(report)
            }
            Err(e) => {
                error!(user_id = user_id, error = %e, "Automation run failed");
                if let Err(record_err) =
                    self.db
                        .record_run_status(user_id, RunStatus::Error, Some(&e.to_string()), now)
                {
                    warn!(user_id = user_id, error = %record_err, "Failed to record run status");
                }
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        user_id: &str,
        month: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<RunReport> {
        let today = now.date_naive();
        let policy = &self.config.policy;
        let settings = self.db.get_or_create_settings(user_id)?;
        let mut warnings = Vec::new();

        let backfill = match self.backfill(user_id).await {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(user_id = user_id, error = %e, "Category backfill failed");
                warnings.push(format!("category backfill failed: {}", e));
                None
            }
        };

        let builder = ReportBuilder::new(&self.db, self.ai.as_ref(), &self.generator);
        let scorer = Scorer::new(&self.db, self.ai.as_ref(), policy);
        let (report, score) = tokio::try_join!(
            builder.build(user_id, month, today, settings.spending_spike_pct),
            scorer.compute(user_id, today, now),
        )?;

        let insights_written = self.persist_snapshots(&report, &score.snapshot).await?;
        merge_warnings(&mut warnings, &report.warnings);
        merge_warnings(&mut warnings, &score.warnings);

        let fx_quote = self.fetch_quote(&settings, &mut warnings).await;

        let inputs = RuleInputs {
            settings: &settings,
            period: report.period,
            forecast: &report.forecast,
            current_expense: report.current.expense,
            previous_expense: report.previous.expense,
            delta_percent: report.delta_percent,
            fx_quote,
            fx_pair: self.fx.as_ref().map_or("USD-BRL", |fx| fx.pair()),
            billing: &score.billing,
            positions: &score.positions,
        };
        let mut events = evaluate(&inputs);
        events.extend(score.risk_alerts.iter().cloned());
        let events = dedup_exact(events);
        debug!(user_id = user_id, candidates = events.len(), "Rules evaluated");

        let summary = settings.monthly_report_enabled.then(|| DigestSummary {
            period: report.period.key(),
            income: report.current.income,
            expense: report.current.expense,
            forecast_net: report.forecast.net,
        });
        let fanout = self
            .notifier
            .fan_out(&self.db, &settings, events.clone(), summary.as_ref(), now)
            .await;
        merge_warnings(&mut warnings, &fanout.warnings);

        Ok(RunReport {
            user_id: user_id.to_string(),
            period: report.period,
            backfill,
            insights_written,
            score: score.snapshot.score,
            risk_level: score.snapshot.risk_level,
            fx_quote,
            events,
            fanout,
            warnings,
        })
    }

    /// Write the insight and score snapshots in one transaction
    async fn persist_snapshots(
        &self,
        report: &MonthlyReport,
        snapshot: &RelationshipScoreSnapshot,
    ) -> Result<usize> {
        let db = self.db.clone();
        let period = report.period.key();
        let insights = report.insights.clone();
        let score = snapshot.score;
        let snapshot = snapshot.clone();

        let count = tokio::task::spawn_blocking(move || {
            db.persist_run_snapshots(&period, &insights, &snapshot)
        })
        .await??;

        info!(
            user_id = %report.user_id,
            period = %report.period,
            insights = count,
            score = score,
            "Run snapshots stored"
        );
        Ok(count)
    }

    async fn backfill(&self, user_id: &str) -> Result<BackfillReport> {
        let db = self.db.clone();
        let user_id = user_id.to_string();
        let limit = self.config.policy.backfill_limit;
        tokio::task::spawn_blocking(move || backfill_categories(&db, &user_id, limit)).await?
    }

    /// Quote for the FX rules, only when the user has a threshold and market refresh on
    async fn fetch_quote(
        &self,
        settings: &AutomationSettings,
        warnings: &mut Vec<String>,
    ) -> Option<f64> {
        let wants_quote = settings.market_refresh_enabled
            && (settings.dollar_upper.is_some() || settings.dollar_lower.is_some());
        if !wants_quote {
            return None;
        }

        let result = match &self.fx {
            Some(fx) => fx.fetch_quote().await,
            None => Err(DegradedReason::NotConfigured("fx provider")),
        };
        match result {
            Ok(quote) => Some(quote),
            Err(reason) => {
                warn!(user_id = %settings.user_id, reason = %reason, "FX quote unavailable");
                warnings.push(reason.as_warning("fx quote"));
                None
            }
        }
    }

    /// Run every known user, at most `worker_limit` at a time
    pub async fn run_all(&self) -> Result<BatchReport> {
        let user_ids = self.db.list_user_ids()?;
        let limit = self.config.policy.worker_limit.max(1);
        info!(users = user_ids.len(), workers = limit, "Starting batch run");

        let semaphore = Arc::new(Semaphore::new(limit));
        let mut tasks = JoinSet::new();
        for user_id in user_ids {
            let engine = self.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let outcome = engine.run_user(&user_id, None).await;
                (user_id, outcome)
            });
        }

        let mut batch = BatchReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(report))) => batch.completed.push(report),
                Ok((user_id, Err(e))) => batch.failed.push((user_id, e.to_string())),
                Err(e) => error!(error = %e, "Automation task panicked"),
            }
        }

        info!(
            completed = batch.completed.len(),
            failed = batch.failed.len(),
            "Batch run finished"
        );
        Ok(batch)
    }
}

fn merge_warnings(into: &mut Vec<String>, from: &[String]) {
    for w in from {
        if !into.contains(w) {
            into.push(w.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlertType, EntryKind, NewLedgerEntry, SettingsPatch};
    use crate::test_utils::MockProviderServer;
    use chrono::{NaiveDate, TimeZone};

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn engine(db: &Database) -> AutomationEngine {
        AutomationEngine::new(db.clone(), EngineConfig::default())
            .with_ai(None)
            .with_fx(None)
            .with_notifier(Notifier::new(None, None, 18))
    }

    fn seed_deficit_month(db: &Database) {
        db.insert_ledger_entry(&NewLedgerEntry::new(
            "u1",
            day(2024, 6, 2),
            EntryKind::Income,
            "Salario",
            1000.0,
        ))
        .unwrap();
        db.insert_ledger_entry(&NewLedgerEntry::new(
            "u1",
            day(2024, 6, 5),
            EntryKind::Expense,
            "Aluguel",
            1500.0,
        ))
        .unwrap();
    }

    #[tokio::test]
    async fn test_deficit_month_raises_forecast_alert_once() {
        let db = Database::in_memory().unwrap();
        seed_deficit_month(&db);
        let engine = engine(&db);

        let report = engine.run_user_at("u1", None, at(2024, 6, 10, 12)).await.unwrap();
        assert_eq!(report.period.key(), "2024-06");
        assert!(report
            .events
            .iter()
            .any(|e| e.alert_type == AlertType::ForecastNegative));
        assert_eq!(db.count_alerts("u1", AlertType::ForecastNegative).unwrap(), 1);
        assert!(report.insights_written > 0);
        assert_eq!(db.count_score_snapshots("u1").unwrap(), 1);

        // Re-run an hour later: snapshots replaced, alert deduplicated
        let again = engine.run_user_at("u1", None, at(2024, 6, 10, 13)).await.unwrap();
        assert_eq!(again.insights_written, report.insights_written);
        assert_eq!(db.count_alerts("u1", AlertType::ForecastNegative).unwrap(), 1);
        assert_eq!(db.count_score_snapshots("u1").unwrap(), 1);
        assert!(again.fanout.alerts_suppressed >= 1);

        let settings = db.get_settings("u1").unwrap().unwrap();
        assert_eq!(settings.last_status, Some(RunStatus::Ok));
        assert_eq!(settings.last_run_at, Some(at(2024, 6, 10, 13)));
    }

    #[tokio::test]
    async fn test_spike_event_uses_user_threshold() {
        let db = Database::in_memory().unwrap();
        for (date, amount) in [(day(2024, 5, 10), 800.0), (day(2024, 6, 3), 1000.0)] {
            db.insert_ledger_entry(&NewLedgerEntry::new("u1", date, EntryKind::Expense, "Mercado", amount))
                .unwrap();
        }
        let engine = engine(&db);

        let report = engine.run_user_at("u1", Some("2024-06"), at(2024, 6, 30, 9)).await.unwrap();
        assert!(report.events.iter().any(|e| e.alert_type == AlertType::SpendingSpike
            && e.title == "Spending spike this month"));

        db.update_settings(
            "u1",
            &SettingsPatch {
                spending_spike_pct: Some(30.0),
                ..Default::default()
            },
        )
        .unwrap();
        let report = engine.run_user_at("u1", Some("2024-06"), at(2024, 6, 30, 10)).await.unwrap();
        assert!(!report.events.iter().any(|e| e.title == "Spending spike this month"));
    }

    #[tokio::test]
    async fn test_fx_above_threshold_once() {
        let server = MockProviderServer::start().await;
        server.set_fx_bid("5.50");
        let db = Database::in_memory().unwrap();
        db.update_settings(
            "u1",
            &SettingsPatch {
                dollar_upper: Some(Some(5.0)),
                ..Default::default()
            },
        )
        .unwrap();

        let fx = FxClient::new(&server.fx_base_url(), "USD-BRL", Duration::from_secs(5));
        let engine = engine(&db).with_fx(Some(fx));
        let report = engine.run_user_at("u1", None, at(2024, 6, 10, 12)).await.unwrap();

        assert_eq!(report.fx_quote, Some(5.5));
        let fx_events: Vec<_> = report
            .events
            .iter()
            .filter(|e| matches!(e.alert_type, AlertType::FxAbove | AlertType::FxBelow))
            .collect();
        assert_eq!(fx_events.len(), 1);
        assert_eq!(fx_events[0].alert_type, AlertType::FxAbove);
    }

    #[tokio::test]
    async fn test_fx_outage_is_a_warning() {
        let server = MockProviderServer::start().await;
        server.fail_fx(503);
        let db = Database::in_memory().unwrap();
        db.update_settings(
            "u1",
            &SettingsPatch {
                dollar_lower: Some(Some(6.0)),
                ..Default::default()
            },
        )
        .unwrap();

        let fx = FxClient::new(&server.fx_base_url(), "USD-BRL", Duration::from_secs(5));
        let report = engine(&db)
            .with_fx(Some(fx))
            .run_user_at("u1", None, at(2024, 6, 10, 12))
            .await
            .unwrap();

        assert_eq!(report.fx_quote, None);
        assert!(report.warnings.iter().any(|w| w.starts_with("fx quote unavailable")));
    }

    #[tokio::test]
    async fn test_hard_failure_records_error_and_writes_nothing() {
        let db = Database::in_memory().unwrap();
        seed_deficit_month(&db);
        db.conn().unwrap().execute_batch("DROP TABLE relationship_scores").unwrap();

        let result = engine(&db).run_user_at("u1", None, at(2024, 6, 10, 12)).await;
        assert!(result.is_err());

        let settings = db.get_settings("u1").unwrap().unwrap();
        assert_eq!(settings.last_status, Some(RunStatus::Error));
        assert!(settings.last_error.is_some());
        assert!(db.list_insights("u1", "2024-06").unwrap().is_empty());
        assert_eq!(db.count_alerts("u1", AlertType::ForecastNegative).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failed_score_write_keeps_previous_insights() {
        let db = Database::in_memory().unwrap();
        seed_deficit_month(&db);
        let engine = engine(&db);
        engine.run_user_at("u1", None, at(2024, 6, 10, 12)).await.unwrap();
        let before = db.list_insights("u1", "2024-06").unwrap();
        assert!(!before.is_empty());

        db.insert_ledger_entry(&NewLedgerEntry::new(
            "u1",
            day(2024, 6, 11),
            EntryKind::Expense,
            "IFOOD *Pedido",
            300.0,
        ))
        .unwrap();
        db.conn()
            .unwrap()
            .execute_batch(
                r#"
                CREATE TRIGGER block_scores BEFORE INSERT ON relationship_scores
                BEGIN
                    SELECT RAISE(ABORT, 'score writes blocked');
                END;
                "#,
            )
            .unwrap();

        let result = engine.run_user_at("u1", None, at(2024, 6, 11, 12)).await;
        assert!(result.is_err());

        assert_eq!(db.list_insights("u1", "2024-06").unwrap(), before);
        assert_eq!(db.count_score_snapshots("u1").unwrap(), 1);
        let settings = db.get_settings("u1").unwrap().unwrap();
        assert_eq!(settings.last_status, Some(RunStatus::Error));
    }

    #[tokio::test]
    async fn test_run_all_visits_every_user() {
        let db = Database::in_memory().unwrap();
        for user in ["a", "b", "c"] {
            db.insert_ledger_entry(&NewLedgerEntry::new(user, day(2024, 6, 3), EntryKind::Expense, "Uber", 30.0))
                .unwrap();
        }
        let batch = engine(&db).run_all().await.unwrap();
        assert_eq!(batch.completed.len(), 3);
        assert!(batch.failed.is_empty());
    }
}
