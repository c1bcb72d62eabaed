//! Relationship score snapshot operations

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::insights::write_insights;
use super::{format_datetime, parse_date, parse_datetime, parse_json, Database};
use crate::error::{Error, Result};
use crate::models::{InsightRecord, RelationshipScoreSnapshot, RiskLevel};

const SCORE_COLUMNS: &str = "user_id, reference_date, month_ref, score, pillars, risk_level, \
     recommendations, model_recommendations, indicators, updated_at";

impl Database {
    /// Insert or fully replace the snapshot for `(user_id, reference_date)`
    pub fn upsert_score_snapshot(&self, snapshot: &RelationshipScoreSnapshot) -> Result<()> {
        let conn = self.conn()?;
        write_score_snapshot(&conn, snapshot)
    }

    /// Write a run's insight snapshot and score snapshot together
    ///
    /// Both land in one transaction: if either write fails, neither is
    /// visible. Returns the number of insight rows written.
    pub fn persist_run_snapshots(
        &self,
        period: &str,
        insights: &[InsightRecord],
        snapshot: &RelationshipScoreSnapshot,
    ) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let count = write_insights(&tx, &snapshot.user_id, period, insights)?;
        write_score_snapshot(&tx, snapshot)?;
        tx.commit()?;
        Ok(count)
    }

    /// Most recent snapshot strictly before `date`
    pub fn previous_score_snapshot(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<RelationshipScoreSnapshot>> {
        let conn = self.conn()?;
        let sql = format!(
            r#"
            SELECT {SCORE_COLUMNS} FROM relationship_scores
            WHERE user_id = ? AND reference_date < ?
            ORDER BY reference_date DESC LIMIT 1
            "#
        );
        conn.query_row(&sql, params![user_id, date.to_string()], row_to_snapshot)
            .optional()?
            .transpose()
    }

    /// Most recent snapshot for a user
    pub fn latest_score_snapshot(&self, user_id: &str) -> Result<Option<RelationshipScoreSnapshot>> {
        let conn = self.conn()?;
        let sql = format!(
            r#"
            SELECT {SCORE_COLUMNS} FROM relationship_scores
            WHERE user_id = ?
            ORDER BY reference_date DESC LIMIT 1
            "#
        );
        conn.query_row(&sql, params![user_id], row_to_snapshot)
            .optional()?
            .transpose()
    }

    /// Number of stored snapshots for a user
    pub fn count_score_snapshots(&self, user_id: &str) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM relationship_scores WHERE user_id = ?",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

/// Decode a row; a corrupt pillars column is a hard error
fn row_to_snapshot(row: &Row) -> rusqlite::Result<Result<RelationshipScoreSnapshot>> {
    let reference_date: String = row.get(1)?;
    let pillars: String = row.get(4)?;
    let risk_level: String = row.get(5)?;
    let updated_at: String = row.get(9)?;
    let score: u8 = row.get(3)?;

    let pillars = match serde_json::from_str(&pillars) {
        Ok(p) => p,
        Err(e) => return Ok(Err(Error::Json(e))),
    };

    Ok(Ok(RelationshipScoreSnapshot {
        user_id: row.get(0)?,
        reference_date: parse_date(&reference_date)?,
        month_ref: row.get(2)?,
        score,
        pillars,
        risk_level: risk_level
            .parse()
            .unwrap_or_else(|_| RiskLevel::from_score(score)),
        recommendations: parse_json(row.get(6)?),
        model_recommendations: parse_json(row.get(7)?),
        indicators: row
            .get::<_, Option<String>>(8)?
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or(serde_json::Value::Null),
        updated_at: parse_datetime(&updated_at),
    }))
}

fn write_score_snapshot(conn: &Connection, snapshot: &RelationshipScoreSnapshot) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO relationship_scores (
            user_id, reference_date, month_ref, score, pillars, risk_level,
            recommendations, model_recommendations, indicators, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(user_id, reference_date) DO UPDATE SET
            month_ref = excluded.month_ref,
            score = excluded.score,
            pillars = excluded.pillars,
            risk_level = excluded.risk_level,
            recommendations = excluded.recommendations,
            model_recommendations = excluded.model_recommendations,
            indicators = excluded.indicators,
            updated_at = excluded.updated_at
        "#,
        params![
            snapshot.user_id,
            snapshot.reference_date.to_string(),
            snapshot.month_ref,
            snapshot.score,
            serde_json::to_string(&snapshot.pillars)?,
            snapshot.risk_level.as_str(),
            serde_json::to_string(&snapshot.recommendations)?,
            serde_json::to_string(&snapshot.model_recommendations)?,
            serde_json::to_string(&snapshot.indicators)?,
            format_datetime(snapshot.updated_at),
        ],
    )?;
    Ok(())
}
