//! Insight snapshot operations

use rusqlite::{params, Connection};

use super::Database;
use crate::error::Result;
use crate::models::{InsightRecord, InsightSource, Severity};

impl Database {
    /// Replace every rule- and model-sourced insight for `(user_id, period)`
    ///
    /// Delete and insert happen in one transaction, so readers see either the
    /// previous snapshot or the new one. An empty slice leaves no rows.
    pub fn replace_insights(
        &self,
        user_id: &str,
        period: &str,
        records: &[InsightRecord],
    ) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let count = write_insights(&tx, user_id, period, records)?;
        tx.commit()?;
        Ok(count)
    }

    /// List the stored insight snapshot for `(user_id, period)` in merge order
    pub fn list_insights(&self, user_id: &str, period: &str) -> Result<Vec<InsightRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT user_id, period, insight_type, title, body, severity, source, metadata
            FROM insights
            WHERE user_id = ? AND period = ?
            ORDER BY position, id
            "#,
        )?;

        let records = stmt
            .query_map(params![user_id, period], |row| {
                let severity: String = row.get(5)?;
                let source: String = row.get(6)?;
                let metadata: Option<String> = row.get(7)?;
                Ok(InsightRecord {
                    user_id: row.get(0)?,
                    period: row.get(1)?,
                    insight_type: row.get(2)?,
                    title: row.get(3)?,
                    body: row.get(4)?,
                    severity: severity.parse().unwrap_or(Severity::Info),
                    source: source.parse().unwrap_or(InsightSource::Rule),
                    metadata: metadata
                        .and_then(|m| serde_json::from_str(&m).ok())
                        .unwrap_or(serde_json::Value::Null),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

/// Delete the rule/model rows for `(user_id, period)` and insert `records`
pub(super) fn write_insights(
    conn: &Connection,
    user_id: &str,
    period: &str,
    records: &[InsightRecord],
) -> Result<usize> {
    conn.execute(
        "DELETE FROM insights WHERE user_id = ? AND period = ? AND source IN ('rule', 'model')",
        params![user_id, period],
    )?;

    let mut stmt = conn.prepare(
        r#"
        INSERT INTO insights (user_id, period, insight_type, title, body, severity, source, metadata, position)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )?;
    for (position, record) in records.iter().enumerate() {
        stmt.execute(params![
            user_id,
            period,
            record.insight_type,
            record.title,
            record.body,
            record.severity.as_str(),
            record.source.as_str(),
            serde_json::to_string(&record.metadata)?,
            position as i64,
        ])?;
    }
    Ok(records.len())
}
