//! Stored insight listing

use anyhow::{Context, Result};
use chrono::Utc;
use nudge_core::{Database, MonthPeriod};

pub fn cmd_insights(db: &Database, user_id: &str, period: Option<&str>) -> Result<()> {
    let period = MonthPeriod::parse_or_current(period, Utc::now().date_naive());
    let insights = db
        .list_insights(user_id, &period.key())
        .context("Failed to load insights")?;

    println!();
    println!("💡 Insights for {} ({})", user_id, period);
    println!("   ─────────────────────────────");
    if insights.is_empty() {
        println!("   No insights stored. Run 'nudge run --user {}' first.", user_id);
    }
    for insight in &insights {
        println!(
            "   {} {} [{}]",
            insight.severity.icon(),
            insight.title,
            insight.source.as_str()
        );
        println!("      {}", insight.body);
    }
    println!();
    Ok(())
}
