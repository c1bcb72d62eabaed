//! Alert operations

use chrono::{DateTime, Utc};
use rusqlite::params;
use rusqlite::types::Type;
use sha2::{Digest, Sha256};

use super::{format_datetime, parse_date, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{AlertRecord, AlertType, AutomationEvent, Severity};

/// Stable key for the `(type, title)` dedup lookup
pub fn alert_fingerprint(alert_type: AlertType, title: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(alert_type.as_str().as_bytes());
    hasher.update(b"\x1f");
    hasher.update(title.trim().as_bytes());
    hex::encode(hasher.finalize())
}

impl Database {
    /// True if an alert with the same type and title was created at or after `since`
    pub fn recent_alert_exists(
        &self,
        user_id: &str,
        alert_type: AlertType,
        title: &str,
        since: DateTime<Utc>,
    ) -> Result<bool> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            r#"
            SELECT COUNT(*) FROM alerts
            WHERE user_id = ? AND fingerprint = ? AND created_at >= ?
            "#,
            params![
                user_id,
                alert_fingerprint(alert_type, title),
                format_datetime(since)
            ],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Insert an alert row for an event
    pub fn insert_alert(
        &self,
        user_id: &str,
        event: &AutomationEvent,
        created_at: DateTime<Utc>,
    ) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO alerts (user_id, card_id, type, title, body, severity, due_at, fingerprint, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                user_id,
                event.card_id,
                event.alert_type.as_str(),
                event.title,
                event.body,
                event.severity.as_str(),
                event.due_at.map(|d| d.to_string()),
                alert_fingerprint(event.alert_type, &event.title),
                format_datetime(created_at),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// List a user's alerts, newest first
    pub fn list_alerts(&self, user_id: &str, unread_only: bool) -> Result<Vec<AlertRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, card_id, type, title, body, severity, due_at, is_read, created_at
            FROM alerts
            WHERE user_id = ? AND (? = 0 OR is_read = 0)
            ORDER BY created_at DESC, id DESC
            "#,
        )?;

        let alerts = stmt
            .query_map(params![user_id, unread_only], |row| {
                let alert_type: String = row.get(3)?;
                let severity: String = row.get(6)?;
                let due_at: Option<String> = row.get(7)?;
                let created_at: String = row.get(9)?;
                Ok(AlertRecord {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    card_id: row.get(2)?,
                    alert_type: alert_type.parse().map_err(|e: String| {
                        rusqlite::Error::FromSqlConversionFailure(3, Type::Text, e.into())
                    })?,
                    title: row.get(4)?,
                    body: row.get(5)?,
                    severity: severity.parse().unwrap_or(Severity::Info),
                    due_at: due_at.as_deref().map(parse_date).transpose()?,
                    is_read: row.get(8)?,
                    created_at: parse_datetime(&created_at),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(alerts)
    }

    /// Mark an alert as read
    pub fn mark_alert_read(&self, alert_id: i64) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE alerts SET is_read = 1 WHERE id = ?",
            params![alert_id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("alert {}", alert_id)));
        }
        Ok(())
    }

    /// Count a user's alerts of one type
    pub fn count_alerts(&self, user_id: &str, alert_type: AlertType) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM alerts WHERE user_id = ? AND type = ?",
            params![user_id, alert_type.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
