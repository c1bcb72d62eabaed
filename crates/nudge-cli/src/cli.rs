//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Nudge - Financial automation and insights
#[derive(Parser)]
#[command(name = "nudge")]
#[command(about = "Automation, insight and alert engine for personal finances", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "nudge.db", global = true)]
    pub db: PathBuf,

    /// Engine config file (defaults to ~/.local/share/nudge/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set NUDGE_DB_KEY environment variable with your passphrase.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Run the automation pipeline for one user now
    Run {
        /// User ID
        #[arg(short, long)]
        user: String,

        /// Month to report on (YYYY-MM, defaults to the current month)
        #[arg(short, long)]
        month: Option<String>,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the automation pipeline for every known user
    RunAll,

    /// Run every user on a fixed interval until interrupted
    Daemon {
        /// Hours between batch runs
        #[arg(long, default_value = "24")]
        interval_hours: u64,

        /// Run a batch immediately instead of waiting for the first interval
        #[arg(long)]
        run_on_start: bool,
    },

    /// Show or change a user's automation settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// List stored insights for a period
    Insights {
        /// User ID
        #[arg(short, long)]
        user: String,

        /// Period (YYYY-MM, defaults to the current month)
        #[arg(short, long)]
        period: Option<String>,
    },

    /// Show the latest relationship score snapshot
    Score {
        /// User ID
        #[arg(short, long)]
        user: String,

        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// List alerts or mark one as read
    Alerts {
        /// User ID (required when listing)
        #[arg(short, long)]
        user: Option<String>,

        /// Include alerts already marked as read
        #[arg(long)]
        all: bool,

        #[command(subcommand)]
        action: Option<AlertsAction>,
    },

    /// Print the monthly report without storing anything
    Report {
        /// User ID
        #[arg(short, long)]
        user: String,

        /// Month (YYYY-MM, defaults to the current month)
        #[arg(short, long)]
        month: Option<String>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Categorize uncategorized ledger entries
    Backfill {
        /// User ID
        #[arg(short, long)]
        user: String,

        /// Maximum rows to scan (defaults to the configured backfill limit)
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Show settings (created with defaults on first access)
    Show {
        /// User ID
        #[arg(short, long)]
        user: String,
    },

    /// Update settings; omitted fields are left unchanged
    Set {
        /// User ID
        #[arg(short, long)]
        user: String,

        /// Enable push notifications
        #[arg(long)]
        push: Option<bool>,

        /// Enable email digests
        #[arg(long)]
        email: Option<bool>,

        /// Enable in-app alerts
        #[arg(long)]
        internal: Option<bool>,

        /// Days before a card due/closing date to alert (1-10)
        #[arg(long)]
        card_due_days: Option<u32>,

        /// Upper FX threshold, or "none" to clear
        #[arg(long)]
        dollar_upper: Option<String>,

        /// Lower FX threshold, or "none" to clear
        #[arg(long)]
        dollar_lower: Option<String>,

        /// Investment drop percentage (0.5-50)
        #[arg(long)]
        investment_drop: Option<f64>,

        /// Spending spike percentage (5-100)
        #[arg(long)]
        spending_spike: Option<f64>,

        /// Include the monthly summary in email digests
        #[arg(long)]
        monthly_report: Option<bool>,

        /// Fetch market quotes during runs
        #[arg(long)]
        market_refresh: Option<bool>,

        /// Digest email address, or "none" to clear
        #[arg(long)]
        notify_email: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum AlertsAction {
    /// Mark an alert as read
    Read {
        /// Alert ID
        id: i64,
    },
}
