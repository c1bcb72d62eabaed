//! Credit card billing-cycle calculator
//!
//! A cycle runs from the day after one closing date through the next closing
//! date, inclusive. Closing and due days are clamped to the month length.
//! The open invoice is the last closed cycle's spend minus payments made
//! since that closing.

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::models::{Card, EntryKind, LedgerEntry};
use crate::period::MonthPeriod;

/// How far back card activity must be loaded to cover two full cycles
pub const ACTIVITY_LOOKBACK_DAYS: i64 = 70;

/// Billing state of one card on a reference date
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BillingSummary {
    pub card_id: i64,
    pub card_name: String,
    pub last_closing: NaiveDate,
    pub next_closing: NaiveDate,
    /// Due date of the open invoice
    pub due_date: NaiveDate,
    pub open_invoice: f64,
    /// Spend since the last closing
    pub current_cycle: f64,
    pub limit_used: f64,
    pub limit_available: f64,
    pub days_until_due: i64,
    pub days_until_closing: i64,
    pub is_overdue: bool,
}

impl BillingSummary {
    /// True when anything is owed on the card
    pub fn has_outstanding(&self) -> bool {
        self.limit_used > 0.0
    }

    /// Open invoice due within `days` (and not yet overdue)
    pub fn due_within(&self, days: i64) -> bool {
        self.open_invoice > 0.0 && !self.is_overdue && (0..=days).contains(&self.days_until_due)
    }
}

/// Compute the billing summary for `card` as of `today`
///
/// `activity` may contain entries for other cards; they are ignored.
pub fn summarize_card(card: &Card, activity: &[LedgerEntry], today: NaiveDate) -> BillingSummary {
    let this_month = MonthPeriod::containing(today);
    let closing_this_month = this_month.clamped_day(card.closing_day);

    let next_closing_month = if today <= closing_this_month {
        this_month
    } else {
        this_month.next()
    };
    let next_closing = next_closing_month.clamped_day(card.closing_day);
    let last_closing_month = next_closing_month.previous();
    let last_closing = last_closing_month.clamped_day(card.closing_day);
    let prior_closing = last_closing_month.previous().clamped_day(card.closing_day);

    let due_month = if card.due_day > card.closing_day {
        last_closing_month
    } else {
        last_closing_month.next()
    };
    let due_date = due_month.clamped_day(card.due_day);

    let mut closed_cycle_spend = 0.0;
    let mut current_cycle = 0.0;
    let mut paid_since_closing = 0.0;

    for entry in activity.iter().filter(|e| e.card_id == Some(card.id)) {
        let amount = entry.amount.abs();
        if !amount.is_finite() {
            continue;
        }
        let date = entry.occurred_at;
        match entry.kind {
            EntryKind::Expense if date > prior_closing && date <= last_closing => {
                closed_cycle_spend += amount;
            }
            EntryKind::Expense if date > last_closing && date <= today => {
                current_cycle += amount;
            }
            EntryKind::CardPayment if date > last_closing && date <= today => {
                paid_since_closing += amount;
            }
            _ => {}
        }
    }

    let open_invoice = round_cents((closed_cycle_spend - paid_since_closing).max(0.0));
    let current_cycle = round_cents(current_cycle);
    let limit_used = round_cents(open_invoice + current_cycle);

    BillingSummary {
        card_id: card.id,
        card_name: card.name.clone(),
        last_closing,
        next_closing,
        due_date,
        open_invoice,
        current_cycle,
        limit_used,
        limit_available: (card.limit_total - limit_used).max(0.0),
        days_until_due: (due_date - today).num_days(),
        days_until_closing: (next_closing - today).num_days(),
        is_overdue: open_invoice > 0.0 && today > due_date,
    }
}

/// Earliest date whose activity can affect a summary on `today`
pub fn activity_since(today: NaiveDate) -> NaiveDate {
    today - Duration::days(ACTIVITY_LOOKBACK_DAYS)
}

fn round_cents(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
