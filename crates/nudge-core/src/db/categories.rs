//! Category display metadata operations

use rusqlite::{params, OptionalExtension};

use super::Database;
use crate::error::Result;
use crate::models::CategoryMeta;
use crate::text::fold;

/// Icon and color for the built-in categories
const KNOWN_CATEGORIES: &[(&str, &str, &str)] = &[
    ("food", "🍽️", "#f97316"),
    ("groceries", "🛒", "#84cc16"),
    ("transport", "🚗", "#3b82f6"),
    ("subscriptions", "📺", "#8b5cf6"),
    ("investments", "📈", "#10b981"),
    ("housing", "🏠", "#64748b"),
    ("health", "💊", "#ef4444"),
    ("education", "🎓", "#0ea5e9"),
    ("shopping", "🛍️", "#ec4899"),
    ("leisure", "🎉", "#eab308"),
    ("card payment", "💳", "#6366f1"),
];

const FALLBACK_ICON: &str = "🏷️";
const FALLBACK_COLOR: &str = "#94a3b8";

impl Database {
    /// Look up display metadata by category name, creating it if missing
    ///
    /// Keyed by the folded name, so "Alimentação" and "alimentacao" share a row.
    pub fn ensure_category_meta(&self, name: &str) -> Result<CategoryMeta> {
        let key = fold(name);
        let conn = self.conn()?;

        let existing = conn
            .query_row(
                "SELECT normalized_name, name, icon, color FROM category_meta WHERE normalized_name = ?",
                params![key],
                |row| {
                    Ok(CategoryMeta {
                        normalized_name: row.get(0)?,
                        name: row.get(1)?,
                        icon: row.get(2)?,
                        color: row.get(3)?,
                    })
                },
            )
            .optional()?;
        if let Some(meta) = existing {
            return Ok(meta);
        }

        let (icon, color) = KNOWN_CATEGORIES
            .iter()
            .find(|(known, _, _)| *known == key)
            .map(|(_, icon, color)| (*icon, *color))
            .unwrap_or((FALLBACK_ICON, FALLBACK_COLOR));

        let meta = CategoryMeta {
            normalized_name: key,
            name: name.trim().to_string(),
            icon: icon.to_string(),
            color: color.to_string(),
        };

        // A concurrent run may have inserted the same key
        conn.execute(
            "INSERT OR IGNORE INTO category_meta (normalized_name, name, icon, color) VALUES (?, ?, ?, ?)",
            params![meta.normalized_name, meta.name, meta.icon, meta.color],
        )?;

        Ok(meta)
    }

    /// Number of stored category metadata rows
    pub fn count_category_meta(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM category_meta", [], |row| row.get(0))?;
        Ok(count)
    }
}
