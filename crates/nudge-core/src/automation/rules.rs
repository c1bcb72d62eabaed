//! Threshold rules
//!
//! Pure functions from already-computed run data to candidate events.
//! Titles are stable per rule (and per card or asset) because the
//! cross-run dedup keys on `(type, title)`.

use std::collections::HashSet;

use crate::billing::BillingSummary;
use crate::forecast::Forecast;
use crate::models::{AlertType, AutomationEvent, AutomationSettings, InvestmentPosition, Severity};
use crate::period::MonthPeriod;
use crate::text::{money, percent};

/// Everything the rules look at for one run
pub struct RuleInputs<'a> {
    pub settings: &'a AutomationSettings,
    pub period: MonthPeriod,
    pub forecast: &'a Forecast,
    pub current_expense: f64,
    pub previous_expense: f64,
    pub delta_percent: Option<f64>,
    /// None when the quote was not fetched or unavailable
    pub fx_quote: Option<f64>,
    pub fx_pair: &'a str,
    pub billing: &'a [BillingSummary],
    pub positions: &'a [InvestmentPosition],
}

/// Evaluate every rule, in a fixed order
pub fn evaluate(inputs: &RuleInputs<'_>) -> Vec<AutomationEvent> {
    let s = inputs.settings;
    let mut events = Vec::new();

    events.extend(forecast_event(inputs.forecast, inputs.period));
    events.extend(spike_event(
        inputs.delta_percent,
        s.spending_spike_pct,
        inputs.current_expense,
        inputs.previous_expense,
    ));
    if let Some(quote) = inputs.fx_quote {
        events.extend(fx_events(quote, inputs.fx_pair, s.dollar_upper, s.dollar_lower));
    }
    events.extend(card_events(inputs.billing, s.card_due_days));
    events.extend(investment_drop_event(inputs.positions, s.investment_drop_pct));

    events
}

pub fn forecast_event(forecast: &Forecast, period: MonthPeriod) -> Option<AutomationEvent> {
    if !forecast.is_negative() {
        return None;
    }
    Some(AutomationEvent::new(
        AlertType::ForecastNegative,
        Severity::Warning,
        "Negative month-end forecast".to_string(),
        format!(
            "At the current pace {} closes with income {} and expenses {}, a net of {}.",
            period,
            money(forecast.income),
            money(forecast.expense),
            money(forecast.net)
        ),
    ))
}

pub fn spike_event(
    delta_percent: Option<f64>,
    threshold: f64,
    current: f64,
    previous: f64,
) -> Option<AutomationEvent> {
    let pct = delta_percent.filter(|p| *p >= threshold)?;
    Some(AutomationEvent::new(
        AlertType::SpendingSpike,
        Severity::Warning,
        "Spending spike this month".to_string(),
        format!(
            "Expenses are {} above last month ({} vs {}).",
            percent(pct),
            money(current),
            money(previous)
        ),
    ))
}

/// Upper and lower thresholds are checked independently
pub fn fx_events(
    quote: f64,
    pair: &str,
    upper: Option<f64>,
    lower: Option<f64>,
) -> Vec<AutomationEvent> {
    let mut events = Vec::new();
    if let Some(upper) = upper.filter(|u| quote >= *u) {
        events.push(AutomationEvent::new(
            AlertType::FxAbove,
            Severity::Info,
            format!("{} above {}", pair, money(upper)),
            format!("{} is quoted at {}, at or above your limit of {}.", pair, money(quote), money(upper)),
        ));
    }
    if let Some(lower) = lower.filter(|l| quote <= *l) {
        events.push(AutomationEvent::new(
            AlertType::FxBelow,
            Severity::Info,
            format!("{} below {}", pair, money(lower)),
            format!("{} is quoted at {}, at or below your target of {}.", pair, money(quote), money(lower)),
        ));
    }
    events
}

/// At most one event per card with something outstanding
///
/// A due invoice takes precedence over an upcoming closing date.
pub fn card_events(billing: &[BillingSummary], days: u32) -> Vec<AutomationEvent> {
    let window = 0..=i64::from(days);
    let mut events = Vec::new();

    for summary in billing.iter().filter(|b| b.has_outstanding()) {
        if summary.open_invoice > 0.0 && window.contains(&summary.days_until_due) {
            let severity = if summary.days_until_due <= 1 {
                Severity::Critical
            } else {
                Severity::Warning
            };
            events.push(
                AutomationEvent::new(
                    AlertType::CardDue,
                    severity,
                    format!("{} invoice due soon", summary.card_name),
                    format!(
                        "{} due on {} ({}).",
                        money(summary.open_invoice),
                        summary.due_date,
                        days_phrase(summary.days_until_due)
                    ),
                )
                .with_card(summary.card_id, summary.due_date),
            );
        } else if window.contains(&summary.days_until_closing) {
            events.push(
                AutomationEvent::new(
                    AlertType::CardClosing,
                    Severity::Info,
                    format!("{} invoice closing soon", summary.card_name),
                    format!(
                        "The invoice closes on {} ({}) with {} so far.",
                        summary.next_closing,
                        days_phrase(summary.days_until_closing),
                        money(summary.current_cycle)
                    ),
                )
                .with_card(summary.card_id, summary.next_closing),
            );
        }
    }
    events
}

fn days_phrase(days: i64) -> String {
    match days {
        0 => "today".to_string(),
        1 => "tomorrow".to_string(),
        n => format!("in {} days", n),
    }
}

/// The worst mover among active positions, if its drop reaches `threshold`
pub fn investment_drop_event(
    positions: &[InvestmentPosition],
    threshold: f64,
) -> Option<AutomationEvent> {
    let (position, previous, drop) = positions
        .iter()
        .filter(|p| p.is_active())
        .filter_map(|p| {
            let previous = p.previous_price()?;
            let drop = (previous - p.current_price) / previous * 100.0;
            drop.is_finite().then_some((p, previous, drop))
        })
        .max_by(|a, b| a.2.total_cmp(&b.2))?;

    if drop < threshold {
        return None;
    }
    Some(AutomationEvent::new(
        AlertType::InvestmentDrop,
        Severity::Warning,
        format!("{} dropped", position.asset_name),
        format!(
            "{} fell {} (from {} to {}).",
            position.asset_name,
            percent(drop),
            money(previous),
            money(position.current_price)
        ),
    ))
}

/// Drop exact `(type, title, body)` repeats, keeping the first
pub fn dedup_exact(events: Vec<AutomationEvent>) -> Vec<AutomationEvent> {
    let mut seen = HashSet::new();
    events
        .into_iter()
        .filter(|e| seen.insert((e.alert_type, e.title.clone(), e.body.clone())))
        .collect()
}
