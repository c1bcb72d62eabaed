//! Error types for Nudge
//!
//! Two tiers:
//! - [`Error`] is a hard failure. Store and query errors abort the current
//!   user's run and leave prior snapshots untouched.
//! - [`DegradedReason`] is a soft failure of an optional external dependency
//!   (language model, FX quotes, push, email, optional tables). Callers
//!   substitute a documented default and keep going.

use std::fmt;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl Error {
    /// True when the underlying store error is a missing table
    ///
    /// Optional tables (investments) degrade instead of failing the run.
    pub fn is_missing_table(&self) -> bool {
        match self {
            Error::Database(e) => e.to_string().contains("no such table"),
            _ => false,
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Why an optional external call produced no usable result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DegradedReason {
    /// Provider not configured (missing host, key, or recipient)
    NotConfigured(&'static str),
    /// Call exceeded its timeout
    Timeout,
    /// Provider answered with a non-2xx status
    Status(u16),
    /// Provider answered 2xx with nothing usable
    EmptyContent,
    /// Body could not be parsed
    Unparsable(String),
    /// Connection-level failure
    Transport(String),
    /// Optional store table is absent
    MissingTable(String),
}

impl DegradedReason {
    /// Short warning string recorded on run reports
    pub fn as_warning(&self, feature: &str) -> String {
        format!("{} unavailable: {}", feature, self)
    }
}

impl fmt::Display for DegradedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DegradedReason::NotConfigured(what) => write!(f, "{} not configured", what),
            DegradedReason::Timeout => write!(f, "timed out"),
            DegradedReason::Status(code) => write!(f, "provider returned status {}", code),
            DegradedReason::EmptyContent => write!(f, "provider returned empty content"),
            DegradedReason::Unparsable(detail) => write!(f, "unparsable response: {}", detail),
            DegradedReason::Transport(detail) => write!(f, "transport error: {}", detail),
            DegradedReason::MissingTable(table) => write!(f, "table {} is missing", table),
        }
    }
}

impl From<reqwest::Error> for DegradedReason {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            DegradedReason::Timeout
        } else if let Some(status) = e.status() {
            DegradedReason::Status(status.as_u16())
        } else if e.is_decode() {
            DegradedReason::Unparsable(e.to_string())
        } else {
            DegradedReason::Transport(e.to_string())
        }
    }
}

/// Result of an optional external call
pub type Degradable<T> = std::result::Result<T, DegradedReason>;
