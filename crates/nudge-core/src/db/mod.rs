//! Record store access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `ledger` - Ledger entries and classifier write-back
//! - `cards` - Credit cards and their ledger activity
//! - `investments` - Investment positions (optional table)
//! - `settings` - Per-user automation settings and run bookkeeping
//! - `insights` - Insight snapshots per period
//! - `scores` - Relationship score snapshots per day
//! - `alerts` - Alert records and the dedup window lookup
//! - `categories` - Category display metadata
//! - `push` - Push subscriptions

use chrono::{DateTime, NaiveDate, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use tracing::info;

use crate::error::{Error, Result};

mod alerts;
mod cards;
mod categories;
mod insights;
mod investments;
mod ledger;
mod push;
mod scores;
mod settings;

pub use alerts::alert_fingerprint;
pub use cards::NewCard;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Environment variable for database encryption key
pub const DB_KEY_ENV: &str = "NUDGE_DB_KEY";

/// Derive an encryption key from a passphrase using Argon2
///
/// Uses a fixed application salt so the same passphrase always produces the
/// same key regardless of database path.
fn derive_key(passphrase: &str) -> Result<String> {
    use argon2::{password_hash::SaltString, Argon2, PasswordHasher};

    // Changing this invalidates every existing encrypted database
    const APP_SALT: &[u8; 16] = b"nudge-salt-v1-fx";

    let salt = SaltString::encode_b64(APP_SALT)
        .map_err(|e| Error::Encryption(format!("Failed to create salt: {}", e)))?;

    let hash = Argon2::default()
        .hash_password(passphrase.as_bytes(), &salt)
        .map_err(|e| Error::Encryption(format!("Failed to derive key: {}", e)))?;

    let hash_bytes = hash
        .hash
        .ok_or_else(|| Error::Encryption("No hash output".to_string()))?;
    Ok(hex::encode(hash_bytes.as_bytes()))
}

/// Timestamp format used for every DATETIME column
pub(crate) const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse a SQLite datetime string into a DateTime<Utc>
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    chrono::NaiveDateTime::parse_from_str(s, DATETIME_FMT)
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

pub(crate) fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.format(DATETIME_FMT).to_string()
}

/// Parse a stored `YYYY-MM-DD` date column
pub(crate) fn parse_date(s: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Decode a JSON text column, treating bad JSON as the type's default
pub(crate) fn parse_json<T: serde::de::DeserializeOwned + Default>(s: Option<String>) -> T {
    s.and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    db_path: String,
}

impl Database {
    /// Open an encrypted database
    ///
    /// Requires the `NUDGE_DB_KEY` environment variable. Use
    /// `new_unencrypted()` for development and tests.
    pub fn new(path: &str) -> Result<Self> {
        match std::env::var(DB_KEY_ENV).ok() {
            Some(key) => Self::new_with_key(path, Some(&key)),
            None => Err(Error::Encryption(format!(
                "Database encryption required. Set {} environment variable with your passphrase, \
                or use --no-encrypt for unencrypted databases (not recommended for production).",
                DB_KEY_ENV
            ))),
        }
    }

    /// Open an unencrypted database
    pub fn new_unencrypted(path: &str) -> Result<Self> {
        Self::new_with_key(path, None)
    }

    /// Open a database with an explicit encryption passphrase
    pub fn new_with_key(path: &str, passphrase: Option<&str>) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path);

        let pool = if let Some(pass) = passphrase {
            let key_pragma = format!("PRAGMA key = 'x\"{}\"';", derive_key(pass)?);
            let manager = manager.with_init(move |conn| {
                conn.execute_batch(&key_pragma)?;
                Ok(())
            });
            Pool::builder().max_size(10).build(manager)?
        } else {
            Pool::builder().max_size(10).build(manager)?
        };

        let db = Self {
            pool,
            db_path: path.to_string(),
        };
        db.run_migrations()?;

        Ok(db)
    }

    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Create a throwaway database (for testing)
    ///
    /// Uses a temporary file rather than `:memory:` because every pooled
    /// connection would otherwise see its own empty database.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir()
            .join(format!("nudge_test_{}_{}.db", std::process::id(), id))
            .to_string_lossy()
            .to_string();

        let _ = std::fs::remove_file(&path);

        Self::new_unencrypted(&path)
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Users the batch runner should visit
    ///
    /// Anyone with ledger activity or stored automation settings.
    pub fn list_user_ids(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT user_id FROM ledger_entries
            UNION
            SELECT user_id FROM automation_settings
            ORDER BY user_id
            "#,
        )?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            -- WAL: concurrent user runs read while one of them writes
            PRAGMA journal_mode = WAL;
            PRAGMA cache_size = 2000;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;

            -- Credit cards
            CREATE TABLE IF NOT EXISTS cards (
                id INTEGER PRIMARY KEY,
                user_id TEXT NOT NULL,
                name TEXT NOT NULL,
                issuer TEXT NOT NULL DEFAULT '',
                limit_total REAL NOT NULL DEFAULT 0,
                closing_day INTEGER NOT NULL,
                due_day INTEGER NOT NULL,
                archived BOOLEAN NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_cards_user ON cards(user_id, archived);

            -- Ledger entries (amount is a non-negative magnitude, kind carries direction)
            CREATE TABLE IF NOT EXISTS ledger_entries (
                id INTEGER PRIMARY KEY,
                user_id TEXT NOT NULL,
                occurred_at DATE NOT NULL,
                kind TEXT NOT NULL,                        -- income, expense, adjustment, card_payment, transfer
                description TEXT NOT NULL DEFAULT '',
                category TEXT,
                amount REAL NOT NULL,
                card_id INTEGER REFERENCES cards(id),
                tags TEXT,                                 -- JSON array
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_ledger_user_date ON ledger_entries(user_id, occurred_at);
            CREATE INDEX IF NOT EXISTS idx_ledger_card ON ledger_entries(card_id);

            -- Investment positions
            CREATE TABLE IF NOT EXISTS investments (
                id INTEGER PRIMARY KEY,
                user_id TEXT NOT NULL,
                asset_name TEXT NOT NULL,
                asset_type TEXT NOT NULL DEFAULT '',
                quantity REAL NOT NULL DEFAULT 0,
                current_price REAL NOT NULL DEFAULT 0,
                average_price REAL NOT NULL DEFAULT 0,
                current_amount REAL NOT NULL DEFAULT 0,
                invested_amount REAL NOT NULL DEFAULT 0,
                operation TEXT NOT NULL DEFAULT 'buy',     -- buy, sell
                price_history TEXT,                        -- JSON array, oldest first
                updated_at DATE NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_investments_user ON investments(user_id, updated_at);

            -- Automation settings (one row per user, created lazily)
            CREATE TABLE IF NOT EXISTS automation_settings (
                user_id TEXT PRIMARY KEY,
                push_enabled BOOLEAN,
                email_enabled BOOLEAN,
                internal_enabled BOOLEAN,
                card_due_days INTEGER,
                dollar_upper REAL,
                dollar_lower REAL,
                investment_drop_pct REAL,
                spending_spike_pct REAL,
                monthly_report_enabled BOOLEAN,
                market_refresh_enabled BOOLEAN,
                notify_email TEXT,
                extras TEXT,                               -- JSON object
                last_run_at DATETIME,
                last_status TEXT,                          -- ok, error
                last_error TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            -- Insight snapshots (replaced per user + period)
            CREATE TABLE IF NOT EXISTS insights (
                id INTEGER PRIMARY KEY,
                user_id TEXT NOT NULL,
                period TEXT NOT NULL,                      -- YYYY-MM
                insight_type TEXT NOT NULL,
                title TEXT NOT NULL,
                body TEXT NOT NULL,
                severity TEXT NOT NULL,                    -- info, success, warning, critical
                source TEXT NOT NULL,                      -- rule, model
                metadata TEXT,                             -- JSON
                position INTEGER NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_insights_user_period ON insights(user_id, period);

            -- Relationship score snapshots (one per user per day)
            CREATE TABLE IF NOT EXISTS relationship_scores (
                user_id TEXT NOT NULL,
                reference_date DATE NOT NULL,
                month_ref TEXT NOT NULL,
                score INTEGER NOT NULL,
                pillars TEXT NOT NULL,                     -- JSON PillarScores
                risk_level TEXT NOT NULL,
                recommendations TEXT,                      -- JSON array
                model_recommendations TEXT,                -- JSON array
                indicators TEXT,                           -- JSON object
                updated_at DATETIME NOT NULL,
                PRIMARY KEY (user_id, reference_date)
            );

            -- Alerts (append-only from the engine, marked read by the user)
            CREATE TABLE IF NOT EXISTS alerts (
                id INTEGER PRIMARY KEY,
                user_id TEXT NOT NULL,
                card_id INTEGER,
                type TEXT NOT NULL,
                title TEXT NOT NULL,
                body TEXT NOT NULL,
                severity TEXT NOT NULL DEFAULT 'info',
                due_at DATE,
                fingerprint TEXT NOT NULL,                 -- sha256(type, title)
                is_read BOOLEAN NOT NULL DEFAULT 0,
                created_at DATETIME NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_alerts_dedup ON alerts(user_id, fingerprint, created_at);
            CREATE INDEX IF NOT EXISTS idx_alerts_unread ON alerts(user_id, is_read);

            -- Category display metadata
            CREATE TABLE IF NOT EXISTS category_meta (
                normalized_name TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                icon TEXT NOT NULL,
                color TEXT NOT NULL
            );

            -- Push subscriptions
            CREATE TABLE IF NOT EXISTS push_subscriptions (
                id INTEGER PRIMARY KEY,
                user_id TEXT NOT NULL,
                endpoint TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(user_id, endpoint)
            );
            "#,
        )?;

        info!("Database schema initialized");
        Ok(())
    }
}
