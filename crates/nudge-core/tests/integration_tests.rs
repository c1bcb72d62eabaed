//! Integration tests for nudge-core
//!
//! These tests exercise full automation runs against a temp-file store:
//! backfill → report ∥ score → snapshots → rules → dedup → fan-out.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use nudge_core::{
    aggregate_range,
    ai::{AIClient, MockBackend},
    db::{Database, NewCard},
    models::{
        AlertType, EntryKind, InsightSource, InvestmentOperation, NewInvestmentPosition,
        NewLedgerEntry, RiskLevel, RunStatus, SettingsPatch,
    },
    AutomationEngine, DegradedReason, EngineConfig, MonthPeriod, Notifier,
};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn at(y: i32, m: u32, day: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, day, h, 0, 0).unwrap()
}

/// Engine with no external providers
fn offline_engine(db: &Database) -> AutomationEngine {
    AutomationEngine::new(db.clone(), EngineConfig::default())
        .with_ai(None)
        .with_fx(None)
        .with_notifier(Notifier::new(None, None, 18))
}

fn add(db: &Database, user: &str, date: NaiveDate, kind: EntryKind, desc: &str, amount: f64) {
    db.insert_ledger_entry(&NewLedgerEntry::new(user, date, kind, desc, amount))
        .expect("insert ledger entry");
}

/// May 2024: 800 spent; June 2024: income 4000, 1000 spent across categories
fn seed_two_months(db: &Database) {
    add(db, "ana", d(2024, 5, 12), EntryKind::Expense, "Mercado Extra", 800.0);
    add(db, "ana", d(2024, 6, 1), EntryKind::Income, "Salario", 4000.0);
    add(db, "ana", d(2024, 6, 2), EntryKind::Expense, "Aluguel", 600.0);
    add(db, "ana", d(2024, 6, 3), EntryKind::Expense, "IFOOD *Pedido", 150.0);
    add(db, "ana", d(2024, 6, 4), EntryKind::Expense, "Netflix.com", 50.0);
    add(db, "ana", d(2024, 6, 5), EntryKind::Expense, "Posto Shell", 200.0);
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_spending_spike_insight_and_event() {
    let db = Database::in_memory().expect("Failed to create database");
    seed_two_months(&db);

    let report = offline_engine(&db)
        .run_user_at("ana", Some("2024-06"), at(2024, 6, 30, 20))
        .await
        .expect("run");

    let insights = db.list_insights("ana", "2024-06").unwrap();
    assert!(insights.iter().any(|i| i.insight_type == "spending_spike"));
    assert!(insights.len() <= 6);
    assert!(report
        .events
        .iter()
        .any(|e| e.alert_type == AlertType::SpendingSpike && e.body.contains("25%")));
}

#[tokio::test]
async fn test_fresh_user_score_defaults() {
    let db = Database::in_memory().unwrap();
    let report = offline_engine(&db)
        .run_user_at("new", None, at(2024, 6, 10, 9))
        .await
        .unwrap();

    let snapshot = db.latest_score_snapshot("new").unwrap().unwrap();
    assert_eq!(snapshot.pillars.limit_usage, 75.0);
    assert_eq!(snapshot.pillars.punctuality, 100.0);
    assert_eq!(snapshot.reference_date, d(2024, 6, 10));
    assert_eq!(report.score, snapshot.score);
    assert_eq!(report.risk_level, RiskLevel::from_score(snapshot.score));
    assert!(report.events.is_empty());
}

#[tokio::test]
async fn test_investment_drawdown_event() {
    let db = Database::in_memory().unwrap();
    db.insert_investment(&NewInvestmentPosition {
        user_id: "ana".into(),
        asset_name: "ACME3".into(),
        asset_type: "stock".into(),
        quantity: 10.0,
        current_price: 80.0,
        average_price: 95.0,
        invested_amount: 950.0,
        operation: InvestmentOperation::Buy,
        price_history: vec![100.0],
        updated_at: d(2024, 1, 15),
    })
    .unwrap();

    let engine = offline_engine(&db);
    let report = engine.run_user_at("ana", None, at(2024, 6, 10, 9)).await.unwrap();
    let drop = report
        .events
        .iter()
        .find(|e| e.alert_type == AlertType::InvestmentDrop)
        .expect("drop event");
    assert!(drop.body.contains("20%"));

    db.update_settings(
        "ana",
        &SettingsPatch {
            investment_drop_pct: Some(25.0),
            ..Default::default()
        },
    )
    .unwrap();
    let report = engine.run_user_at("ana", None, at(2024, 6, 11, 9)).await.unwrap();
    assert!(!report
        .events
        .iter()
        .any(|e| e.alert_type == AlertType::InvestmentDrop));
}

#[tokio::test]
async fn test_card_due_soon_event() {
    let db = Database::in_memory().unwrap();
    let card = db
        .insert_card(&NewCard::new("ana", "Visa", 5000.0, 1, 12))
        .unwrap();
    db.insert_ledger_entry(
        &NewLedgerEntry::new("ana", d(2024, 5, 20), EntryKind::Expense, "Loja", 700.0).with_card(card),
    )
    .unwrap();

    // Cycle closed June 1, invoice due June 12
    let report = offline_engine(&db)
        .run_user_at("ana", None, at(2024, 6, 10, 9))
        .await
        .unwrap();
    let due = report
        .events
        .iter()
        .find(|e| e.alert_type == AlertType::CardDue)
        .expect("card due event");
    assert_eq!(due.card_id, Some(card));
    assert_eq!(due.due_at, Some(d(2024, 6, 12)));
}

// =============================================================================
// Idempotence and dedup
// =============================================================================

#[tokio::test]
async fn test_insight_snapshot_is_replaced_not_appended() {
    let db = Database::in_memory().unwrap();
    seed_two_months(&db);
    let engine = offline_engine(&db);

    engine
        .run_user_at("ana", Some("2024-06"), at(2024, 6, 30, 8))
        .await
        .unwrap();
    let first = db.list_insights("ana", "2024-06").unwrap();
    engine
        .run_user_at("ana", Some("2024-06"), at(2024, 6, 30, 9))
        .await
        .unwrap();
    let second = db.list_insights("ana", "2024-06").unwrap();

    let titles = |v: &[nudge_core::InsightRecord]| v.iter().map(|i| i.title.clone()).collect::<Vec<_>>();
    assert_eq!(titles(&first), titles(&second));
}

#[tokio::test]
async fn test_alerts_deduplicated_within_window() {
    let db = Database::in_memory().unwrap();
    seed_two_months(&db);
    let engine = offline_engine(&db);

    engine
        .run_user_at("ana", Some("2024-06"), at(2024, 6, 30, 8))
        .await
        .unwrap();
    let after_first = db.list_alerts("ana", false).unwrap().len();
    assert!(after_first > 0);

    engine
        .run_user_at("ana", Some("2024-06"), at(2024, 6, 30, 20))
        .await
        .unwrap();
    assert_eq!(db.list_alerts("ana", false).unwrap().len(), after_first);

    // 31 hours after the first alerts the window has passed
    engine
        .run_user_at("ana", Some("2024-06"), at(2024, 7, 1, 15))
        .await
        .unwrap();
    let spikes = db
        .list_alerts("ana", false)
        .unwrap()
        .into_iter()
        .filter(|a| a.title == "Spending spike this month")
        .count();
    assert_eq!(spikes, 2);
}

// =============================================================================
// Degradation
// =============================================================================

#[tokio::test]
async fn test_missing_investments_table_degrades() {
    let db = Database::in_memory().unwrap();
    seed_two_months(&db);
    db.conn().unwrap().execute_batch("DROP TABLE investments").unwrap();

    let report = offline_engine(&db)
        .run_user_at("ana", Some("2024-06"), at(2024, 6, 30, 8))
        .await
        .expect("run should degrade, not fail");

    assert!(report
        .warnings
        .iter()
        .any(|w| w.contains("table investments is missing")));
    assert_eq!(db.count_score_snapshots("ana").unwrap(), 1);
    let settings = db.get_settings("ana").unwrap().unwrap();
    assert_eq!(settings.last_status, Some(RunStatus::Ok));
}

#[tokio::test]
async fn test_model_failure_keeps_heuristic_insights() {
    let db = Database::in_memory().unwrap();
    seed_two_months(&db);
    let ai = AIClient::Mock(MockBackend::failing(DegradedReason::Timeout));

    let report = offline_engine(&db)
        .with_ai(Some(ai))
        .run_user_at("ana", Some("2024-06"), at(2024, 6, 30, 8))
        .await
        .unwrap();

    assert!(report
        .warnings
        .iter()
        .any(|w| w.starts_with("model insights unavailable")));
    let insights = db.list_insights("ana", "2024-06").unwrap();
    assert!(!insights.is_empty());
    assert!(insights.iter().all(|i| i.source == InsightSource::Rule));
}

#[tokio::test]
async fn test_model_lines_are_merged() {
    let db = Database::in_memory().unwrap();
    seed_two_months(&db);

    offline_engine(&db)
        .with_ai(Some(AIClient::mock()))
        .run_user_at("ana", Some("2024-06"), at(2024, 6, 30, 8))
        .await
        .unwrap();

    let insights = db.list_insights("ana", "2024-06").unwrap();
    let model = insights
        .iter()
        .filter(|i| i.source == InsightSource::Model)
        .count();
    assert!((1..=3).contains(&model));
    assert!(insights.len() <= 6);

    let snapshot = db.latest_score_snapshot("ana").unwrap().unwrap();
    assert!(!snapshot.model_recommendations.is_empty());
}

// =============================================================================
// Aggregation invariants
// =============================================================================

#[test]
fn test_category_shares_sum_to_100() {
    let db = Database::in_memory().unwrap();
    seed_two_months(&db);

    let range = MonthPeriod::parse("2024-06").unwrap().range();
    let agg = aggregate_range(&db, "ana", range).unwrap();

    assert_eq!(agg.expense, 1000.0);
    assert_eq!(agg.income, 4000.0);
    let total_share: f64 = agg.category_totals.iter().map(|c| c.share_pct).sum();
    assert!((total_share - 100.0).abs() < 1e-6);
    assert!(agg.expense_rows.iter().all(|r| r.amount >= 0.0));
}
