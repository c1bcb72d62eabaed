//! Automation run commands (run, run-all, backfill)

use anyhow::{Context, Result};
use nudge_core::{backfill_categories, AutomationEngine, BatchReport, Database, RunReport};

use super::truncate;

pub async fn cmd_run(
    engine: &AutomationEngine,
    user_id: &str,
    month: Option<&str>,
    json: bool,
) -> Result<()> {
    let report = engine
        .run_user(user_id, month)
        .await
        .with_context(|| format!("Automation run failed for {}", user_id))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_run_report(&report);
    }
    Ok(())
}

pub async fn cmd_run_all(engine: &AutomationEngine) -> Result<()> {
    println!("🔁 Running automation for all users...");
    let batch = engine.run_all().await.context("Batch run failed")?;
    print_batch_report(&batch);
    Ok(())
}

pub fn cmd_backfill(db: &Database, user_id: &str, limit: usize) -> Result<()> {
    let report = backfill_categories(db, user_id, limit).context("Backfill failed")?;
    println!(
        "🏷️  Categorized {} of {} scanned entries for {}",
        report.updated, report.scanned, user_id
    );
    Ok(())
}

pub fn print_run_report(report: &RunReport) {
    println!();
    println!("📊 Automation run for {} ({})", report.user_id, report.period);
    println!("   ─────────────────────────────");
    if let Some(backfill) = &report.backfill {
        println!(
            "   Backfill: {} categorized / {} scanned",
            backfill.updated, backfill.scanned
        );
    }
    println!("   Insights written: {}", report.insights_written);
    println!("   Score: {} ({})", report.score, report.risk_level);
    if let Some(quote) = report.fx_quote {
        println!("   FX quote: {:.4}", quote);
    }

    let fanout = &report.fanout;
    println!(
        "   Events: {} candidates, {} new, {} suppressed",
        fanout.candidates,
        fanout.delivered.len(),
        fanout.alerts_suppressed
    );
    for event in &fanout.delivered {
        println!(
            "     {} {} - {}",
            event.severity.icon(),
            event.title,
            truncate(&event.body, 70)
        );
    }
    if fanout.push_sent + fanout.push_failed > 0 {
        println!(
            "   Push: {} sent, {} failed",
            fanout.push_sent, fanout.push_failed
        );
    }
    if let Some(channel) = fanout.email {
        println!("   Email: sent via {:?}", channel);
    }

    if !report.warnings.is_empty() {
        println!();
        for warning in &report.warnings {
            println!("   ⚠️  {}", warning);
        }
    }
    println!();
}

pub fn print_batch_report(batch: &BatchReport) {
    println!(
        "✅ {} users completed, {} failed",
        batch.completed.len(),
        batch.failed.len()
    );
    for report in &batch.completed {
        println!(
            "   {} score {} ({} new alerts)",
            report.user_id,
            report.score,
            report.fanout.delivered.len()
        );
    }
    for (user_id, error) in &batch.failed {
        println!("   ❌ {}: {}", user_id, error);
    }
}
