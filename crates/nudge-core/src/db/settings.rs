//! Automation settings operations
//!
//! Stored rows may be partial (older rows, manual edits). Every read goes
//! through `AutomationSettings::normalize`, so callers always see a full value.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use super::{format_datetime, parse_datetime, Database};
use crate::error::Result;
use crate::models::{AutomationSettings, RunStatus, SettingsPatch};

impl Database {
    /// Load a user's settings, creating the default row on first access
    pub fn get_or_create_settings(&self, user_id: &str) -> Result<AutomationSettings> {
        if let Some(settings) = self.get_settings(user_id)? {
            return Ok(settings);
        }

        let defaults = AutomationSettings::defaults(user_id);
        self.write_settings(&defaults)?;
        Ok(defaults)
    }

    /// Load a user's settings without creating them
    pub fn get_settings(&self, user_id: &str) -> Result<Option<AutomationSettings>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                r#"
                SELECT push_enabled, email_enabled, internal_enabled, card_due_days,
                       dollar_upper, dollar_lower, investment_drop_pct, spending_spike_pct,
                       monthly_report_enabled, market_refresh_enabled, notify_email, extras,
                       last_run_at, last_status, last_error
                FROM automation_settings WHERE user_id = ?
                "#,
                params![user_id],
                |row| {
                    let extras: Option<String> = row.get(11)?;
                    let patch = SettingsPatch {
                        push_enabled: row.get(0)?,
                        email_enabled: row.get(1)?,
                        internal_enabled: row.get(2)?,
                        card_due_days: row.get(3)?,
                        dollar_upper: Some(row.get(4)?),
                        dollar_lower: Some(row.get(5)?),
                        investment_drop_pct: row.get(6)?,
                        spending_spike_pct: row.get(7)?,
                        monthly_report_enabled: row.get(8)?,
                        market_refresh_enabled: row.get(9)?,
                        notify_email: Some(row.get(10)?),
                        extras: extras.and_then(|s| serde_json::from_str(&s).ok()),
                    };
                    let last_run_at: Option<String> = row.get(12)?;
                    let last_status: Option<String> = row.get(13)?;
                    let last_error: Option<String> = row.get(14)?;
                    Ok((patch, last_run_at, last_status, last_error))
                },
            )
            .optional()?;

        Ok(row.map(|(patch, last_run_at, last_status, last_error)| {
            let mut settings = AutomationSettings::normalize(user_id, &patch);
            settings.last_run_at = last_run_at.as_deref().map(parse_datetime);
            settings.last_status = last_status.and_then(|s| s.parse().ok());
            settings.last_error = last_error;
            settings
        }))
    }

    /// Apply a user settings update and return the stored result
    pub fn update_settings(
        &self,
        user_id: &str,
        patch: &SettingsPatch,
    ) -> Result<AutomationSettings> {
        let current = self.get_or_create_settings(user_id)?;
        let next = current.merged(patch);
        self.write_settings(&next)?;
        Ok(next)
    }

    /// Record the outcome of an automation run
    pub fn record_run_status(
        &self,
        user_id: &str,
        status: RunStatus,
        error: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.get_or_create_settings(user_id)?;

        let conn = self.conn()?;
        conn.execute(
            r#"
            UPDATE automation_settings
            SET last_run_at = ?, last_status = ?, last_error = ?
            WHERE user_id = ?
            "#,
            params![format_datetime(at), status.as_str(), error, user_id],
        )?;
        Ok(())
    }

    fn write_settings(&self, s: &AutomationSettings) -> Result<()> {
        let conn = self.conn()?;
        let extras = serde_json::to_string(&s.extras)?;

        conn.execute(
            r#"
            INSERT INTO automation_settings (
                user_id, push_enabled, email_enabled, internal_enabled, card_due_days,
                dollar_upper, dollar_lower, investment_drop_pct, spending_spike_pct,
                monthly_report_enabled, market_refresh_enabled, notify_email, extras
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                push_enabled = excluded.push_enabled,
                email_enabled = excluded.email_enabled,
                internal_enabled = excluded.internal_enabled,
                card_due_days = excluded.card_due_days,
                dollar_upper = excluded.dollar_upper,
                dollar_lower = excluded.dollar_lower,
                investment_drop_pct = excluded.investment_drop_pct,
                spending_spike_pct = excluded.spending_spike_pct,
                monthly_report_enabled = excluded.monthly_report_enabled,
                market_refresh_enabled = excluded.market_refresh_enabled,
                notify_email = excluded.notify_email,
                extras = excluded.extras,
                updated_at = CURRENT_TIMESTAMP
            "#,
            params![
                s.user_id,
                s.push_enabled,
                s.email_enabled,
                s.internal_enabled,
                s.card_due_days,
                s.dollar_upper,
                s.dollar_lower,
                s.investment_drop_pct,
                s.spending_spike_pct,
                s.monthly_report_enabled,
                s.market_refresh_enabled,
                s.notify_email,
                extras,
            ],
        )?;
        Ok(())
    }
}
