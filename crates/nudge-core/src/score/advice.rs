//! Recommendations and risk alerts derived from score indicators

use crate::models::{AlertType, AutomationEvent, PillarScores, Severity};
use crate::text::{fold, percent};

use super::pillars::Indicators;

/// Usage at which `limit_high` fires, and where it turns critical
pub const LIMIT_HIGH_PCT: f64 = 70.0;
pub const LIMIT_CRITICAL_PCT: f64 = 85.0;

/// Point drop against the previous snapshot that raises `score_drop`
pub const SCORE_DROP_POINTS: u8 = 7;

/// 30-day growth over the 90-day average that raises `spending_spike`
pub const SPENDING_SPIKE_GROWTH_PCT: f64 = 20.0;

/// Rule-based recommendations, deduplicated and capped at `max`
pub fn recommendations(ind: &Indicators, pillars: &PillarScores, max: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();

    if ind.overdue_invoices > 0 {
        out.push("Pay your overdue card invoice as soon as possible to stop interest and protect your score.".into());
    }
    if pillars.punctuality < 70.0 {
        out.push("Pay your card invoices by the due date; setting up automatic payment helps.".into());
    }
    if let Some(usage) = ind.limit_usage_pct.filter(|u| *u > 50.0) {
        out.push(format!(
            "You are using {} of your card limits. Try to stay below 30%.",
            percent(usage)
        ));
    }
    if pillars.investments < 78.0 {
        out.push("Build an investment habit: even a small monthly contribution adds up.".into());
    }
    if let Some(growth) = ind.expense_growth_pct.filter(|g| *g > 15.0) {
        out.push(format!(
            "Spending in the last 30 days is {} above your 3-month average. Review recent purchases.",
            percent(growth)
        ));
    }
    match ind.savings_rate_pct {
        Some(rate) if rate < 10.0 => {
            out.push("Aim to save at least 10% of your income each month.".into())
        }
        None if ind.expense_30d > 0.0 => {
            out.push("Record your income so your savings rate can be tracked.".into())
        }
        _ => {}
    }
    if pillars.history < 68.0 {
        out.push("Record your transactions regularly so your history reflects your real activity.".into());
    }

    dedup_folded(out, max)
}

/// Candidate alerts raised by the score
pub fn risk_alerts(ind: &Indicators, score: u8, previous: Option<u8>) -> Vec<AutomationEvent> {
    let mut alerts = Vec::new();

    if ind.overdue_invoices > 0 || ind.due_soon_invoices > 0 {
        let (severity, body) = if ind.overdue_invoices > 0 {
            (
                Severity::Critical,
                format!(
                    "{} card invoice(s) overdue. Late payments weigh heavily on your score.",
                    ind.overdue_invoices
                ),
            )
        } else {
            (
                Severity::Warning,
                format!(
                    "{} card invoice(s) due in the next days and still unpaid.",
                    ind.due_soon_invoices
                ),
            )
        };
        alerts.push(AutomationEvent::new(
            AlertType::DelayRisk,
            severity,
            "Card payment at risk".into(),
            body,
        ));
    }

    if let Some(usage) = ind.limit_usage_pct.filter(|u| *u >= LIMIT_HIGH_PCT) {
        let severity = if usage >= LIMIT_CRITICAL_PCT {
            Severity::Critical
        } else {
            Severity::Warning
        };
        alerts.push(AutomationEvent::new(
            AlertType::LimitHigh,
            severity,
            "High card limit usage".into(),
            format!("You are using {} of your total card limit.", percent(usage)),
        ));
    }

    if let Some(prev) = previous {
        if score.saturating_add(SCORE_DROP_POINTS) <= prev {
            alerts.push(AutomationEvent::new(
                AlertType::ScoreDrop,
                Severity::Warning,
                "Financial score dropped".into(),
                format!("Your score went from {} to {}.", prev, score),
            ));
        }
    }

    if let Some(growth) = ind
        .expense_growth_pct
        .filter(|g| *g >= SPENDING_SPIKE_GROWTH_PCT)
    {
        alerts.push(AutomationEvent::new(
            AlertType::SpendingSpike,
            Severity::Warning,
            "Spending above your average".into(),
            format!(
                "The last 30 days are {} above your 3-month average.",
                percent(growth)
            ),
        ));
    }

    alerts
}

/// Keep the first of each folded line, up to `max`
pub(crate) fn dedup_folded(lines: Vec<String>, max: usize) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    lines
        .into_iter()
        .filter(|l| seen.insert(fold(l)))
        .take(max)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pillars(value: f64) -> PillarScores {
        PillarScores {
            punctuality: value,
            limit_usage: value,
            investments: value,
            history: value,
            spending_control: value,
        }
    }

    #[test]
    fn test_healthy_user_gets_no_recommendations() {
        let ind = Indicators {
            savings_rate_pct: Some(30.0),
            ..Default::default()
        };
        assert!(recommendations(&ind, &pillars(100.0), 6).is_empty());
    }

    #[test]
    fn test_recommendations_are_capped() {
        let ind = Indicators {
            overdue_invoices: 1,
            limit_usage_pct: Some(90.0),
            expense_growth_pct: Some(40.0),
            savings_rate_pct: Some(-10.0),
            ..Default::default()
        };
        let recs = recommendations(&ind, &pillars(10.0), 6);
        assert_eq!(recs.len(), 6);
        assert!(recs[0].contains("overdue"));
        assert_eq!(recommendations(&ind, &pillars(10.0), 2).len(), 2);
    }

    #[test]
    fn test_limit_high_severity_bands() {
        let at = |pct| {
            risk_alerts(
                &Indicators {
                    limit_usage_pct: Some(pct),
                    ..Default::default()
                },
                80,
                None,
            )
        };
        assert!(at(69.9).is_empty());
        assert_eq!(at(70.0)[0].severity, Severity::Warning);
        assert_eq!(at(85.0)[0].severity, Severity::Critical);
    }

    #[test]
    fn test_score_drop_threshold() {
        let ind = Indicators::default();
        assert!(risk_alerts(&ind, 73, Some(80))
            .iter()
            .any(|a| a.alert_type == AlertType::ScoreDrop));
        assert!(risk_alerts(&ind, 74, Some(80)).is_empty());
        assert!(risk_alerts(&ind, 50, None).is_empty());
    }

    #[test]
    fn test_delay_risk_and_spike() {
        let ind = Indicators {
            due_soon_invoices: 1,
            expense_growth_pct: Some(20.0),
            ..Default::default()
        };
        let alerts = risk_alerts(&ind, 70, None);
        let types: Vec<_> = alerts.iter().map(|a| a.alert_type).collect();
        assert_eq!(types, vec![AlertType::DelayRisk, AlertType::SpendingSpike]);
        assert_eq!(alerts[0].severity, Severity::Warning);
    }
}
