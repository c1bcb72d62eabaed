//! Expense aggregation over a date range
//!
//! Reads ledger entries and investment buys for one user and range, and
//! derives income/expense totals, a per-category breakdown and normalized
//! expense rows. No writes.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::warn;

use crate::classify::classify;
use crate::db::Database;
use crate::error::{DegradedReason, Result};
use crate::models::{EntryKind, InvestmentPosition, LedgerEntry};
use crate::period::DateRange;

/// Ledger kinds the aggregator reads
pub const AGGREGATED_KINDS: [EntryKind; 4] = [
    EntryKind::Income,
    EntryKind::Adjustment,
    EntryKind::Expense,
    EntryKind::CardPayment,
];

/// Where an expense row came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RowSource {
    Ledger,
    Investment,
}

/// A normalized outflow
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpenseRow {
    pub id: i64,
    pub date: NaiveDate,
    pub description: String,
    pub category: String,
    pub amount: f64,
    /// Ledger kind, or "investment" for buys
    pub expense_type: String,
    pub source: RowSource,
}

/// Spend for one category
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    pub category: String,
    pub total: f64,
    /// Share of the expense total, 0-100
    pub share_pct: f64,
}

/// Aggregated view of one range
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Aggregate {
    pub income: f64,
    pub expense: f64,
    /// Sorted by total, descending
    pub category_totals: Vec<CategoryTotal>,
    /// Sorted by amount, descending
    pub expense_rows: Vec<ExpenseRow>,
    /// Soft degradations hit while reading
    pub warnings: Vec<String>,
}

impl Aggregate {
    pub fn top_category(&self) -> Option<&CategoryTotal> {
        self.category_totals.first()
    }

    pub fn largest_expense(&self) -> Option<&ExpenseRow> {
        self.expense_rows.first()
    }
}

/// Aggregate a user's activity in `range`
///
/// Ledger query failures propagate. A missing investments table is recorded
/// as a warning and investment rows are omitted.
pub fn aggregate_range(db: &Database, user_id: &str, range: DateRange) -> Result<Aggregate> {
    let entries = db.list_ledger_entries(user_id, range, &AGGREGATED_KINDS)?;

    let mut warnings = Vec::new();
    let buys = match db.list_investment_buys(user_id, range) {
        Ok(buys) => buys,
        Err(e) if e.is_missing_table() => {
            let reason = DegradedReason::MissingTable("investments".to_string());
            warn!(user_id = user_id, reason = %reason, "Skipping investment outflows");
            warnings.push(reason.as_warning("investment outflows"));
            Vec::new()
        }
        Err(e) => return Err(e),
    };

    let mut aggregate = summarize(&entries, &buys);
    aggregate.warnings = warnings;
    Ok(aggregate)
}

/// Pure aggregation over already-loaded rows
pub fn summarize(entries: &[LedgerEntry], buys: &[InvestmentPosition]) -> Aggregate {
    let mut income = 0.0;
    let mut expense = 0.0;
    let mut by_category: HashMap<String, f64> = HashMap::new();
    let mut rows = Vec::new();

    for entry in entries {
        let amount = entry.amount.abs();
        if !amount.is_finite() || amount <= 0.0 {
            continue;
        }
        match entry.kind {
            kind if kind.is_inflow() => income += amount,
            EntryKind::Expense | EntryKind::CardPayment => {
                expense += amount;
                let category = classify(&entry.description, entry.category.as_deref());
                *by_category.entry(category.clone()).or_default() += amount;
                rows.push(ExpenseRow {
                    id: entry.id,
                    date: entry.occurred_at,
                    description: entry.description.clone(),
                    category,
                    amount,
                    expense_type: entry.kind.as_str().to_string(),
                    source: RowSource::Ledger,
                });
            }
            _ => {}
        }
    }

    for buy in buys {
        let amount = buy_amount(buy);
        if !amount.is_finite() || amount <= 0.0 {
            continue;
        }
        expense += amount;
        let category = "Investments".to_string();
        *by_category.entry(category.clone()).or_default() += amount;
        rows.push(ExpenseRow {
            id: buy.id,
            date: buy.updated_at,
            description: buy.asset_name.clone(),
            category,
            amount,
            expense_type: "investment".to_string(),
            source: RowSource::Investment,
        });
    }

    let mut category_totals: Vec<CategoryTotal> = by_category
        .into_iter()
        .map(|(category, total)| CategoryTotal {
            share_pct: if expense > 0.0 {
                total / expense * 100.0
            } else {
                0.0
            },
            category,
            total,
        })
        .collect();
    category_totals.sort_by(|a, b| {
        b.total
            .total_cmp(&a.total)
            .then_with(|| a.category.cmp(&b.category))
    });

    rows.sort_by(|a, b| b.amount.total_cmp(&a.amount).then_with(|| a.date.cmp(&b.date)));

    Aggregate {
        income,
        expense,
        category_totals,
        expense_rows: rows,
        warnings: Vec::new(),
    }
}

fn buy_amount(buy: &InvestmentPosition) -> f64 {
    if buy.invested_amount.abs() > 0.0 {
        buy.invested_amount.abs()
    } else {
        (buy.quantity * buy.average_price).abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InvestmentOperation;

    fn entry(id: i64, kind: EntryKind, description: &str, amount: f64) -> LedgerEntry {
        LedgerEntry {
            id,
            user_id: "u1".into(),
            occurred_at: NaiveDate::from_ymd_opt(2024, 5, id as u32).unwrap(),
            kind,
            description: description.into(),
            category: None,
            amount,
            card_id: None,
            tags: vec![],
        }
    }

    #[test]
    fn test_totals_and_classification() {
        let entries = vec![
            entry(1, EntryKind::Income, "Salary", 5000.0),
            entry(2, EntryKind::Adjustment, "Refund", 100.0),
            entry(3, EntryKind::Expense, "IFOOD", 60.0),
            entry(4, EntryKind::Expense, "Uber trip", 40.0),
            entry(5, EntryKind::CardPayment, "Pagamento fatura", 300.0),
            entry(6, EntryKind::Transfer, "Moving money", 999.0),
        ];
        let agg = summarize(&entries, &[]);

        assert_eq!(agg.income, 5100.0);
        assert_eq!(agg.expense, 400.0);
        assert_eq!(agg.expense_rows.len(), 3);
        assert_eq!(agg.expense_rows[0].amount, 300.0);
        assert_eq!(agg.top_category().unwrap().category, "Card Payment");
    }

    #[test]
    fn test_skips_non_finite_and_zero_amounts() {
        let entries = vec![
            entry(1, EntryKind::Expense, "a", 0.0),
            entry(2, EntryKind::Expense, "b", f64::NAN),
            entry(3, EntryKind::Expense, "c", f64::INFINITY),
            entry(4, EntryKind::Expense, "d", -25.0),
        ];
        let agg = summarize(&entries, &[]);
        assert_eq!(agg.expense, 25.0);
        assert!(agg.expense_rows.iter().all(|r| r.amount >= 0.0));
    }

    #[test]
    fn test_category_shares_sum_to_hundred() {
        let entries = vec![
            entry(1, EntryKind::Expense, "IFOOD", 33.3),
            entry(2, EntryKind::Expense, "Netflix", 17.9),
            entry(3, EntryKind::Expense, "Posto Shell", 120.0),
            entry(4, EntryKind::Expense, "Something", 7.0),
        ];
        let agg = summarize(&entries, &[]);
        let sum: f64 = agg.category_totals.iter().map(|c| c.share_pct).sum();
        assert!((sum - 100.0).abs() < 1e-9);

        let empty = summarize(&[], &[]);
        assert!(empty.category_totals.is_empty());
        assert_eq!(empty.expense, 0.0);
    }

    #[test]
    fn test_investment_buys_count_as_outflow() {
        let buy = InvestmentPosition {
            id: 9,
            user_id: "u1".into(),
            asset_name: "Tesouro Selic".into(),
            asset_type: "bond".into(),
            quantity: 2.0,
            current_price: 150.0,
            average_price: 140.0,
            current_amount: 300.0,
            invested_amount: 0.0,
            operation: InvestmentOperation::Buy,
            price_history: vec![],
            updated_at: NaiveDate::from_ymd_opt(2024, 5, 3).unwrap(),
        };
        let agg = summarize(&[], &[buy]);
        assert_eq!(agg.expense, 280.0);
        assert_eq!(agg.expense_rows[0].source, RowSource::Investment);
        assert_eq!(agg.category_totals[0].category, "Investments");
    }
}
