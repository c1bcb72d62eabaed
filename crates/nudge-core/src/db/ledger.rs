//! Ledger entry operations

use rusqlite::{params, params_from_iter, Row};

use super::{parse_date, parse_json, Database};
use crate::error::Result;
use crate::models::{EntryKind, LedgerEntry, NewLedgerEntry};
use crate::period::DateRange;

const LEDGER_COLUMNS: &str =
    "id, user_id, occurred_at, kind, description, category, amount, card_id, tags";

impl Database {
    /// Insert a ledger entry
    ///
    /// Negative amounts are stored as their magnitude.
    pub fn insert_ledger_entry(&self, entry: &NewLedgerEntry) -> Result<i64> {
        let conn = self.conn()?;
        let tags = serde_json::to_string(&entry.tags)?;

        conn.execute(
            r#"
            INSERT INTO ledger_entries (user_id, occurred_at, kind, description, category, amount, card_id, tags)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                entry.user_id,
                entry.occurred_at.to_string(),
                entry.kind.as_str(),
                entry.description,
                entry.category,
                entry.amount.abs(),
                entry.card_id,
                tags,
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// List a user's entries of the given kinds in `[start, end)`
    pub fn list_ledger_entries(
        &self,
        user_id: &str,
        range: DateRange,
        kinds: &[EntryKind],
    ) -> Result<Vec<LedgerEntry>> {
        let conn = self.conn()?;

        let placeholders = vec!["?"; kinds.len()].join(", ");
        let sql = format!(
            r#"
            SELECT {LEDGER_COLUMNS}
            FROM ledger_entries
            WHERE user_id = ? AND occurred_at >= ? AND occurred_at < ?
              AND kind IN ({placeholders})
            ORDER BY occurred_at, id
            "#
        );

        let mut values: Vec<String> = vec![
            user_id.to_string(),
            range.start.to_string(),
            range.end_exclusive.to_string(),
        ];
        values.extend(kinds.iter().map(|k| k.as_str().to_string()));

        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map(params_from_iter(values.iter()), row_to_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Most recent uncategorized expense and card-payment entries
    pub fn list_uncategorized_entries(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<LedgerEntry>> {
        let conn = self.conn()?;
        let sql = format!(
            r#"
            SELECT {LEDGER_COLUMNS}
            FROM ledger_entries
            WHERE user_id = ?
              AND kind IN ('expense', 'card_payment')
              AND (category IS NULL OR TRIM(category) = '')
            ORDER BY occurred_at DESC, id DESC
            LIMIT ?
            "#
        );
        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map(params![user_id, limit as i64], row_to_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Write an inferred category unless one was set in the meantime
    ///
    /// Returns true when the row was updated.
    pub fn set_entry_category_if_missing(&self, entry_id: i64, category: &str) -> Result<bool> {
        let conn = self.conn()?;
        let updated = conn.execute(
            r#"
            UPDATE ledger_entries SET category = ?
            WHERE id = ? AND (category IS NULL OR TRIM(category) = '')
            "#,
            params![category, entry_id],
        )?;
        Ok(updated > 0)
    }

    /// Fetch one entry by id
    pub fn get_ledger_entry(&self, entry_id: i64) -> Result<Option<LedgerEntry>> {
        use rusqlite::OptionalExtension;

        let conn = self.conn()?;
        let sql = format!("SELECT {LEDGER_COLUMNS} FROM ledger_entries WHERE id = ?");
        let entry = conn
            .query_row(&sql, params![entry_id], row_to_entry)
            .optional()?;
        Ok(entry)
    }
}

pub(super) fn row_to_entry(row: &Row) -> rusqlite::Result<LedgerEntry> {
    let kind: String = row.get(3)?;
    let date: String = row.get(2)?;
    let amount: f64 = row.get(6)?;

    Ok(LedgerEntry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        occurred_at: parse_date(&date)?,
        kind: kind.parse().unwrap_or(EntryKind::Transfer),
        description: row.get(4)?,
        category: row.get(5)?,
        amount: amount.abs(),
        card_id: row.get(7)?,
        tags: parse_json(row.get(8)?),
    })
}
