//! Credit card operations

use chrono::NaiveDate;
use rusqlite::params;

use super::ledger::row_to_entry;
use super::Database;
use crate::error::Result;
use crate::models::{Card, LedgerEntry};

/// New card for insertion
#[derive(Debug, Clone)]
pub struct NewCard {
    pub user_id: String,
    pub name: String,
    pub issuer: String,
    pub limit_total: f64,
    pub closing_day: u32,
    pub due_day: u32,
}

impl NewCard {
    pub fn new(user_id: &str, name: &str, limit_total: f64, closing_day: u32, due_day: u32) -> Self {
        Self {
            user_id: user_id.to_string(),
            name: name.to_string(),
            issuer: String::new(),
            limit_total,
            closing_day,
            due_day,
        }
    }
}

impl Database {
    /// Insert a card
    pub fn insert_card(&self, card: &NewCard) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO cards (user_id, name, issuer, limit_total, closing_day, due_day)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
            params![
                card.user_id,
                card.name,
                card.issuer,
                card.limit_total,
                card.closing_day,
                card.due_day
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Archive a card (hidden from the engine)
    pub fn archive_card(&self, card_id: i64) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("UPDATE cards SET archived = 1 WHERE id = ?", params![card_id])?;
        Ok(())
    }

    /// List a user's non-archived cards
    pub fn list_active_cards(&self, user_id: &str) -> Result<Vec<Card>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, name, issuer, limit_total, closing_day, due_day, archived
            FROM cards
            WHERE user_id = ? AND archived = 0
            ORDER BY id
            "#,
        )?;

        let cards = stmt
            .query_map(params![user_id], |row| {
                Ok(Card {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    name: row.get(2)?,
                    issuer: row.get(3)?,
                    limit_total: row.get(4)?,
                    closing_day: row.get(5)?,
                    due_day: row.get(6)?,
                    archived: row.get(7)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(cards)
    }

    /// Card-linked expenses and payments on or after `since`
    pub fn list_card_activity(&self, user_id: &str, since: NaiveDate) -> Result<Vec<LedgerEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, occurred_at, kind, description, category, amount, card_id, tags
            FROM ledger_entries
            WHERE user_id = ? AND card_id IS NOT NULL AND occurred_at >= ?
              AND kind IN ('expense', 'card_payment')
            ORDER BY occurred_at, id
            "#,
        )?;
        let entries = stmt
            .query_map(params![user_id, since.to_string()], row_to_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}
