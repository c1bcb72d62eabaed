//! Nudge Core Library
//!
//! Financial automation and insight engine for the Nudge personal finance
//! tracker:
//! - Record store access with connection pooling and migrations
//! - Expense aggregation and keyword category classification
//! - Monthly reports with heuristic and model-assisted insights
//! - Relationship/health score with recommendations and risk alerts
//! - Threshold rules, deduplication and notification fan-out
//! - Pluggable language-model backends and FX/push/email provider clients

pub mod aggregate;
pub mod ai;
pub mod automation;
pub mod billing;
pub mod classify;
pub mod config;
pub mod db;
pub mod error;
pub mod forecast;
pub mod fx;
mod http;
pub mod insights;
pub mod models;
pub mod notify;
pub mod period;
pub mod report;
pub mod score;
pub mod text;

/// Test utilities including the mock provider server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use aggregate::{aggregate_range, Aggregate, CategoryTotal, ExpenseRow};
pub use ai::{AIBackend, AIClient, MockBackend, OllamaBackend, OpenAICompatibleBackend};
pub use automation::{AutomationEngine, BatchReport, RunReport};
pub use billing::{summarize_card, BillingSummary};
pub use classify::{backfill_categories, classify, BackfillReport};
pub use config::{EngineConfig, PolicyConfig, ProviderConfig};
pub use db::{Database, NewCard};
pub use error::{Degradable, DegradedReason, Error, Result};
pub use forecast::Forecast;
pub use fx::FxClient;
pub use insights::{InsightGenerator, InsightSet};
pub use models::*;
pub use notify::{EmailSender, FanoutReport, Notifier, PushClient};
pub use period::{DateRange, MonthPeriod};
pub use report::{MonthlyReport, ReportBuilder};
pub use score::{ScoreOutcome, Scorer};
