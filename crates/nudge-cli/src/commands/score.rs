//! Relationship score snapshot display

use anyhow::{Context, Result};
use nudge_core::Database;

pub fn cmd_score(db: &Database, user_id: &str, json: bool) -> Result<()> {
    let snapshot = db
        .latest_score_snapshot(user_id)
        .context("Failed to load score snapshot")?;

    let Some(snapshot) = snapshot else {
        println!("No score yet for {}. Run 'nudge run --user {}' first.", user_id, user_id);
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    let p = &snapshot.pillars;
    println!();
    println!(
        "🎯 Score {} ({}) for {} on {}",
        snapshot.score, snapshot.risk_level, user_id, snapshot.reference_date
    );
    println!("   ─────────────────────────────");
    println!("   Punctuality:       {:>5.1}", p.punctuality);
    println!("   Limit usage:       {:>5.1}", p.limit_usage);
    println!("   Investments:       {:>5.1}", p.investments);
    println!("   History:           {:>5.1}", p.history);
    println!("   Spending control:  {:>5.1}", p.spending_control);

    if !snapshot.recommendations.is_empty() || !snapshot.model_recommendations.is_empty() {
        println!();
        println!("   Recommendations:");
        for rec in snapshot
            .recommendations
            .iter()
            .chain(&snapshot.model_recommendations)
        {
            println!("   • {}", rec);
        }
    }
    println!();
    Ok(())
}
