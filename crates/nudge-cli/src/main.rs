//! Nudge CLI - Financial automation and insights
//!
//! Usage:
//!   nudge init                      Initialize database
//!   nudge run --user ana            Run automation for one user now
//!   nudge daemon --interval-hours 6 Run every user on a schedule
//!   nudge alerts --user ana         List unread alerts

mod cli;
mod commands;
mod scheduler;


use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::Run { user, month, json } => {
            let engine = commands::open_engine(&cli.db, cli.config.as_deref(), cli.no_encrypt)?;
            commands::cmd_run(&engine, &user, month.as_deref(), json).await
        }
        Commands::RunAll => {
            let engine = commands::open_engine(&cli.db, cli.config.as_deref(), cli.no_encrypt)?;
            commands::cmd_run_all(&engine).await
        }
        Commands::Daemon {
            interval_hours,
            run_on_start,
        } => {
            let engine = commands::open_engine(&cli.db, cli.config.as_deref(), cli.no_encrypt)?;
            let schedule = scheduler::ScheduleConfig::new(interval_hours, run_on_start)?;
            scheduler::run_scheduler(engine, schedule).await
        }
        Commands::Settings { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                SettingsAction::Show { user } => commands::cmd_settings_show(&db, &user),
                SettingsAction::Set {
                    user,
                    push,
                    email,
                    internal,
                    card_due_days,
                    dollar_upper,
                    dollar_lower,
                    investment_drop,
                    spending_spike,
                    monthly_report,
                    market_refresh,
                    notify_email,
                } => {
                    let patch = commands::SettingsArgs {
                        push,
                        email,
                        internal,
                        card_due_days,
                        dollar_upper,
                        dollar_lower,
                        investment_drop,
                        spending_spike,
                        monthly_report,
                        market_refresh,
                        notify_email,
                    }
                    .into_patch()?;
                    commands::cmd_settings_set(&db, &user, &patch)
                }
            }
        }
        Commands::Insights { user, period } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_insights(&db, &user, period.as_deref())
        }
        Commands::Score { user, json } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_score(&db, &user, json)
        }
        Commands::Alerts { user, all, action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                Some(AlertsAction::Read { id }) => commands::cmd_alerts_read(&db, id),
                None => {
                    let user = user.context("--user is required to list alerts")?;
                    commands::cmd_alerts(&db, &user, all)
                }
            }
        }
        Commands::Report { user, month, json } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let config = commands::load_config(cli.config.as_deref())?;
            commands::cmd_report(&db, &config, &user, month.as_deref(), json).await
        }
        Commands::Backfill { user, limit } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let config = commands::load_config(cli.config.as_deref())?;
            commands::cmd_backfill(&db, &user, limit.unwrap_or(config.policy.backfill_limit))
        }
    }
}
