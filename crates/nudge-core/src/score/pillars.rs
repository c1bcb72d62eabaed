//! Score indicators and pillar bands
//!
//! Everything here is pure: indicators are derived from already-loaded
//! cards, billing summaries, ledger entries and positions, and each pillar
//! is a banded function of the indicators clamped to [0, 100].

use std::collections::HashMap;

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

use crate::billing::BillingSummary;
use crate::models::{Card, EntryKind, InvestmentPosition, LedgerEntry, PillarScores};

/// Pillar weights: punctuality, limit usage, investments, history, spending control
pub const WEIGHTS: [f64; 5] = [0.30, 0.25, 0.15, 0.15, 0.15];

/// Trailing window the scorer reads
pub const WINDOW_DAYS: i64 = 90;

/// Months with at least this many transactions count as active
pub const ACTIVE_MONTH_MIN_TX: usize = 8;

/// Invoices due within this many days count against punctuality
pub const DUE_SOON_DAYS: i64 = 3;

/// Raw measurements behind the pillars, stored on the snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Indicators {
    pub payments_total: usize,
    pub payments_on_time: usize,
    pub open_cards: usize,
    pub overdue_invoices: usize,
    pub due_soon_invoices: usize,
    pub card_count: usize,
    pub limit_total: f64,
    pub limit_used: f64,
    /// Used / limit in percent; None without cards or limit
    pub limit_usage_pct: Option<f64>,
    pub active_positions: usize,
    pub total_invested: f64,
    pub transactions_90d: usize,
    pub active_months: usize,
    pub expense_30d: f64,
    pub income_30d: f64,
    pub monthly_avg_expense_90d: f64,
    /// Last 30 days vs the 90-day monthly average, in percent
    pub expense_growth_pct: Option<f64>,
    /// (income - expense) / income over the last 30 days, in percent
    pub savings_rate_pct: Option<f64>,
}

/// Derive indicators as of `today`
///
/// `entries` should cover the trailing [`WINDOW_DAYS`]; older rows are ignored.
pub fn compute_indicators(
    cards: &[Card],
    billing: &[BillingSummary],
    entries: &[LedgerEntry],
    positions: &[InvestmentPosition],
    today: NaiveDate,
) -> Indicators {
    let window_start = today - Duration::days(WINDOW_DAYS - 1);
    let recent_start = today - Duration::days(29);
    let in_window: Vec<&LedgerEntry> = entries
        .iter()
        .filter(|e| e.occurred_at >= window_start && e.occurred_at <= today)
        .collect();

    let due_days: HashMap<i64, u32> = cards.iter().map(|c| (c.id, c.due_day)).collect();
    let mut ind = Indicators {
        card_count: cards.len(),
        ..Default::default()
    };

    for entry in in_window.iter().filter(|e| e.kind == EntryKind::CardPayment) {
        let Some(due_day) = entry.card_id.and_then(|id| due_days.get(&id)) else {
            continue;
        };
        ind.payments_total += 1;
        if entry.occurred_at.day() <= *due_day {
            ind.payments_on_time += 1;
        }
    }

    for summary in billing {
        if summary.has_outstanding() {
            ind.open_cards += 1;
        }
        if summary.is_overdue {
            ind.overdue_invoices += 1;
        } else if summary.due_within(DUE_SOON_DAYS) {
            ind.due_soon_invoices += 1;
        }
        ind.limit_used += summary.limit_used;
    }
    ind.limit_total = cards.iter().map(|c| c.limit_total.max(0.0)).sum();
    ind.limit_usage_pct =
        (ind.limit_total > 0.0).then(|| ind.limit_used / ind.limit_total * 100.0);

    for position in positions.iter().filter(|p| p.is_active()) {
        ind.active_positions += 1;
        ind.total_invested += position.invested_amount.abs();
    }

    ind.transactions_90d = in_window.len();
    let mut per_month: HashMap<(i32, u32), usize> = HashMap::new();
    for entry in &in_window {
        *per_month
            .entry((entry.occurred_at.year(), entry.occurred_at.month()))
            .or_default() += 1;
    }
    ind.active_months = per_month
        .values()
        .filter(|n| **n >= ACTIVE_MONTH_MIN_TX)
        .count();

    let mut expense_90d = 0.0;
    for entry in &in_window {
        let amount = entry.amount.abs();
        if !amount.is_finite() {
            continue;
        }
        let recent = entry.occurred_at >= recent_start;
        match entry.kind {
            EntryKind::Expense | EntryKind::CardPayment => {
                expense_90d += amount;
                if recent {
                    ind.expense_30d += amount;
                }
            }
            kind if kind.is_inflow() && recent => ind.income_30d += amount,
            _ => {}
        }
    }
    ind.monthly_avg_expense_90d = expense_90d / 3.0;
    ind.expense_growth_pct = (ind.monthly_avg_expense_90d > 0.0).then(|| {
        (ind.expense_30d - ind.monthly_avg_expense_90d) / ind.monthly_avg_expense_90d * 100.0
    });
    ind.savings_rate_pct = (ind.income_30d > 0.0)
        .then(|| (ind.income_30d - ind.expense_30d) / ind.income_30d * 100.0);

    ind
}

pub fn punctuality(ind: &Indicators) -> f64 {
    let mut base = if ind.payments_total == 0 {
        100.0
    } else {
        ind.payments_on_time as f64 / ind.payments_total as f64 * 100.0
    };
    if ind.open_cards > 0 && ind.payments_total == 0 {
        base = base.min(70.0);
    }
    base -= 25.0 * ind.overdue_invoices as f64;
    base -= 8.0 * ind.due_soon_invoices as f64;
    clamp(base)
}

pub fn limit_usage(ind: &Indicators) -> f64 {
    let Some(pct) = ind.limit_usage_pct else {
        return 75.0;
    };
    match pct {
        p if p <= 30.0 => 100.0,
        p if p <= 50.0 => 88.0,
        p if p <= 70.0 => 68.0,
        p if p <= 85.0 => 42.0,
        _ => 20.0,
    }
}

pub fn investments(ind: &Indicators) -> f64 {
    let (n, total) = (ind.active_positions, ind.total_invested);
    if n >= 3 && total >= 1000.0 {
        100.0
    } else if n >= 2 && total >= 500.0 {
        90.0
    } else if n >= 1 && total >= 200.0 {
        78.0
    } else if n >= 1 {
        68.0
    } else {
        45.0
    }
}

pub fn history(ind: &Indicators) -> f64 {
    let (months, tx) = (ind.active_months, ind.transactions_90d);
    if months >= 3 && tx >= 30 {
        95.0
    } else if months >= 2 && tx >= 15 {
        82.0
    } else if months >= 1 && tx >= 6 {
        68.0
    } else {
        50.0
    }
}

pub fn spending_control(ind: &Indicators) -> f64 {
    let mut score = 82.0;
    if let Some(growth) = ind.expense_growth_pct {
        score += match growth {
            g if g > 30.0 => -34.0,
            g if g > 15.0 => -20.0,
            g if g > 5.0 => -10.0,
            g if g < -10.0 => 8.0,
            _ => 0.0,
        };
    }
    match ind.savings_rate_pct {
        Some(rate) if rate < 0.0 => score -= 22.0,
        Some(rate) if rate < 10.0 => score -= 12.0,
        Some(rate) if rate >= 20.0 => score += 8.0,
        Some(_) => {}
        // Spending with no income at all is the worst savings rate
        None if ind.expense_30d > 0.0 => score -= 22.0,
        None => {}
    }
    clamp(score)
}

pub fn pillar_scores(ind: &Indicators) -> PillarScores {
    PillarScores {
        punctuality: punctuality(ind),
        limit_usage: limit_usage(ind),
        investments: investments(ind),
        history: history(ind),
        spending_control: spending_control(ind),
    }
}

/// Weighted overall score, rounded and clamped
pub fn overall(p: &PillarScores) -> u8 {
    let values = [
        p.punctuality,
        p.limit_usage,
        p.investments,
        p.history,
        p.spending_control,
    ];
    let weighted: f64 = values.iter().zip(WEIGHTS).map(|(v, w)| v * w).sum();
    clamp(weighted.round()) as u8
}

fn clamp(v: f64) -> f64 {
    if v.is_finite() {
        v.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ind() -> Indicators {
        Indicators::default()
    }

    #[test]
    fn test_weights_sum_to_one() {
        let sum: f64 = WEIGHTS.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_no_cards_no_payments() {
        let i = ind();
        assert_eq!(limit_usage(&i), 75.0);
        // No open cards, so the 70 cap does not apply
        assert_eq!(punctuality(&i), 100.0);
    }

    #[test]
    fn test_punctuality_cap_and_penalties() {
        let i = Indicators {
            open_cards: 2,
            overdue_invoices: 1,
            due_soon_invoices: 1,
            ..ind()
        };
        assert_eq!(punctuality(&i), 70.0 - 25.0 - 8.0);

        let i = Indicators {
            payments_total: 4,
            payments_on_time: 3,
            overdue_invoices: 5,
            ..ind()
        };
        assert_eq!(punctuality(&i), 0.0);
    }

    #[test]
    fn test_limit_bands() {
        let at = |pct: f64| {
            limit_usage(&Indicators {
                limit_usage_pct: Some(pct),
                ..ind()
            })
        };
        assert_eq!(at(30.0), 100.0);
        assert_eq!(at(30.1), 88.0);
        assert_eq!(at(70.0), 68.0);
        assert_eq!(at(85.0), 42.0);
        assert_eq!(at(120.0), 20.0);
    }

    #[test]
    fn test_investment_and_history_bands() {
        let inv = |n, total| {
            investments(&Indicators {
                active_positions: n,
                total_invested: total,
                ..ind()
            })
        };
        assert_eq!(inv(3, 1000.0), 100.0);
        assert_eq!(inv(3, 999.0), 90.0);
        assert_eq!(inv(1, 150.0), 68.0);
        assert_eq!(inv(0, 0.0), 45.0);

        let hist = |months, tx| {
            history(&Indicators {
                active_months: months,
                transactions_90d: tx,
                ..ind()
            })
        };
        assert_eq!(hist(3, 30), 95.0);
        assert_eq!(hist(3, 29), 82.0);
        assert_eq!(hist(1, 6), 68.0);
        assert_eq!(hist(0, 100), 50.0);
    }

    #[test]
    fn test_spending_control_adjustments() {
        let sc = |growth, savings, expense| {
            spending_control(&Indicators {
                expense_growth_pct: growth,
                savings_rate_pct: savings,
                expense_30d: expense,
                ..ind()
            })
        };
        assert_eq!(sc(None, None, 0.0), 82.0);
        assert_eq!(sc(Some(40.0), Some(-5.0), 100.0), 82.0 - 34.0 - 22.0);
        assert_eq!(sc(Some(-20.0), Some(25.0), 100.0), 98.0);
        assert_eq!(sc(Some(10.0), Some(5.0), 100.0), 60.0);
        assert_eq!(sc(None, None, 50.0), 60.0);
    }

    #[test]
    fn test_overall_is_weighted_and_bounded() {
        let perfect = PillarScores {
            punctuality: 100.0,
            limit_usage: 100.0,
            investments: 100.0,
            history: 100.0,
            spending_control: 100.0,
        };
        assert_eq!(overall(&perfect), 100);

        let mixed = PillarScores {
            punctuality: 100.0,
            limit_usage: 75.0,
            investments: 45.0,
            history: 50.0,
            spending_control: 82.0,
        };
        // 30 + 18.75 + 6.75 + 7.5 + 12.3 = 75.3
        assert_eq!(overall(&mixed), 75);
    }

    #[test]
    fn test_indicators_from_rows() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let card = Card {
            id: 7,
            user_id: "u1".into(),
            name: "Visa".into(),
            issuer: String::new(),
            limit_total: 1000.0,
            closing_day: 5,
            due_day: 12,
            archived: false,
        };
        let mk = |date: NaiveDate, kind, amount, card_id| LedgerEntry {
            id: 0,
            user_id: "u1".into(),
            occurred_at: date,
            kind,
            description: String::new(),
            category: None,
            amount,
            card_id,
            tags: vec![],
        };
        let entries = vec![
            mk(today - Duration::days(3), EntryKind::CardPayment, 100.0, Some(7)),
            mk(NaiveDate::from_ymd_opt(2024, 5, 20).unwrap(), EntryKind::CardPayment, 100.0, Some(7)),
            mk(today - Duration::days(2), EntryKind::Income, 1000.0, None),
            mk(today - Duration::days(200), EntryKind::Expense, 5000.0, None),
        ];

        let ind = compute_indicators(&[card], &[], &entries, &[], today);
        assert_eq!(ind.payments_total, 2);
        assert_eq!(ind.payments_on_time, 1);
        assert_eq!(ind.transactions_90d, 3);
        assert_eq!(ind.income_30d, 1000.0);
        assert_eq!(ind.limit_usage_pct, Some(0.0));
    }
}
