//! Push subscription operations

use rusqlite::params;

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::PushSubscription;

impl Database {
    /// Register a push endpoint for a user (idempotent)
    pub fn add_push_subscription(&self, user_id: &str, endpoint: &str) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO push_subscriptions (user_id, endpoint) VALUES (?, ?)",
            params![user_id, endpoint],
        )?;
        let id = conn.query_row(
            "SELECT id FROM push_subscriptions WHERE user_id = ? AND endpoint = ?",
            params![user_id, endpoint],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// List a user's push endpoints
    pub fn list_push_subscriptions(&self, user_id: &str) -> Result<Vec<PushSubscription>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, endpoint, created_at
            FROM push_subscriptions
            WHERE user_id = ?
            ORDER BY id
            "#,
        )?;
        let subs = stmt
            .query_map(params![user_id], |row| {
                let created_at: String = row.get(3)?;
                Ok(PushSubscription {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    endpoint: row.get(2)?,
                    created_at: parse_datetime(&created_at),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(subs)
    }

    /// Remove a push endpoint
    pub fn remove_push_subscription(&self, user_id: &str, endpoint: &str) -> Result<bool> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM push_subscriptions WHERE user_id = ? AND endpoint = ?",
            params![user_id, endpoint],
        )?;
        Ok(removed > 0)
    }
}
