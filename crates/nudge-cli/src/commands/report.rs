//! Monthly report printing

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use nudge_core::text::{money, percent};
use nudge_core::{
    AIClient, AutomationSettings, Database, EngineConfig, InsightGenerator, MonthlyReport,
    ReportBuilder,
};

use super::truncate;

/// Build and print a report; nothing is persisted
pub async fn cmd_report(
    db: &Database,
    config: &EngineConfig,
    user_id: &str,
    month: Option<&str>,
    json: bool,
) -> Result<()> {
    let settings = db
        .get_settings(user_id)
        .context("Failed to load settings")?
        .unwrap_or_else(|| AutomationSettings::defaults(user_id));

    let ai = AIClient::from_env(Duration::from_secs(config.policy.http_timeout_secs));
    let generator = InsightGenerator::new(&config.policy);
    let report = ReportBuilder::new(db, ai.as_ref(), &generator)
        .build(
            user_id,
            month,
            Utc::now().date_naive(),
            settings.spending_spike_pct,
        )
        .await
        .context("Failed to build report")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

pub fn print_report(report: &MonthlyReport) {
    println!();
    println!("📅 {} report for {}", report.period, report.user_id);
    println!("   ─────────────────────────────");
    println!(
        "   Income:   {:>14}   (previous {})",
        money(report.current.income),
        money(report.previous.income)
    );
    println!(
        "   Expenses: {:>14}   (previous {})",
        money(report.current.expense),
        money(report.previous.expense)
    );
    match report.delta_percent {
        Some(pct) => println!("   Change:   {:>14}   ({})", money(report.delta), percent(pct)),
        None => println!("   Change:   {:>14}", money(report.delta)),
    }
    println!(
        "   Forecast: {:>14}   net at month end ({} of {} days)",
        money(report.forecast.net),
        report.forecast.days_elapsed,
        report.forecast.days_in_month
    );

    if !report.categories.is_empty() {
        println!();
        println!("   Categories:");
        for cat in &report.categories {
            println!(
                "   {} {:<20} {:>14} {:>6}",
                cat.icon,
                truncate(&cat.category, 20),
                money(cat.total),
                percent(cat.share_pct)
            );
        }
    }

    if !report.top_expenses.is_empty() {
        println!();
        println!("   Top expenses:");
        for row in &report.top_expenses {
            println!(
                "   {} {:<32} {:>14}",
                row.date,
                truncate(&row.description, 32),
                money(row.amount)
            );
        }
    }

    if !report.insights.is_empty() {
        println!();
        println!("   Insights:");
        for insight in &report.insights {
            println!("   {} {}", insight.severity.icon(), insight.title);
            println!("      {}", insight.body);
        }
    }

    for warning in &report.warnings {
        println!("   ⚠️  {}", warning);
    }
    println!();
}
