//! Investment position operations
//!
//! The investments table is optional: deployments without the investments
//! screen may not have it. Callers check `Error::is_missing_table()` and degrade.

use rusqlite::{params, Row};

use super::{parse_date, parse_json, Database};
use crate::error::Result;
use crate::models::{InvestmentOperation, InvestmentPosition, NewInvestmentPosition};
use crate::period::DateRange;

const INVESTMENT_COLUMNS: &str = "id, user_id, asset_name, asset_type, quantity, current_price, \
     average_price, current_amount, invested_amount, operation, price_history, updated_at";

impl Database {
    /// Insert an investment position
    pub fn insert_investment(&self, position: &NewInvestmentPosition) -> Result<i64> {
        let conn = self.conn()?;
        let history = serde_json::to_string(&position.price_history)?;

        conn.execute(
            r#"
            INSERT INTO investments (
                user_id, asset_name, asset_type, quantity, current_price, average_price,
                current_amount, invested_amount, operation, price_history, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                position.user_id,
                position.asset_name,
                position.asset_type,
                position.quantity,
                position.current_price,
                position.average_price,
                position.quantity * position.current_price,
                position.invested_amount,
                position.operation.as_str(),
                history,
                position.updated_at.to_string(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Positions with a positive quantity
    pub fn list_active_investments(&self, user_id: &str) -> Result<Vec<InvestmentPosition>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {INVESTMENT_COLUMNS} FROM investments WHERE user_id = ? AND quantity > 0 ORDER BY id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let positions = stmt
            .query_map(params![user_id], row_to_position)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(positions)
    }

    /// "Buy" positions dated in `[start, end)`
    pub fn list_investment_buys(
        &self,
        user_id: &str,
        range: DateRange,
    ) -> Result<Vec<InvestmentPosition>> {
        let conn = self.conn()?;
        let sql = format!(
            r#"
            SELECT {INVESTMENT_COLUMNS} FROM investments
            WHERE user_id = ? AND operation = 'buy' AND updated_at >= ? AND updated_at < ?
            ORDER BY updated_at, id
            "#
        );
        let mut stmt = conn.prepare(&sql)?;
        let positions = stmt
            .query_map(
                params![
                    user_id,
                    range.start.to_string(),
                    range.end_exclusive.to_string()
                ],
                row_to_position,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(positions)
    }
}

fn row_to_position(row: &Row) -> rusqlite::Result<InvestmentPosition> {
    let operation: String = row.get(9)?;
    let updated_at: String = row.get(11)?;

    Ok(InvestmentPosition {
        id: row.get(0)?,
        user_id: row.get(1)?,
        asset_name: row.get(2)?,
        asset_type: row.get(3)?,
        quantity: row.get(4)?,
        current_price: row.get(5)?,
        average_price: row.get(6)?,
        current_amount: row.get(7)?,
        invested_amount: row.get(8)?,
        operation: operation.parse().unwrap_or(InvestmentOperation::Buy),
        price_history: parse_json(row.get(10)?),
        updated_at: parse_date(&updated_at)?,
    })
}
