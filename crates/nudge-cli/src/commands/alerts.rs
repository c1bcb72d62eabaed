//! Alert commands (list, read)

use anyhow::{Context, Result};
use nudge_core::Database;

use super::truncate;

pub fn cmd_alerts(db: &Database, user_id: &str, include_read: bool) -> Result<()> {
    let alerts = db
        .list_alerts(user_id, !include_read)
        .context("Failed to load alerts")?;

    if alerts.is_empty() {
        println!("✅ No alerts for {}", user_id);
        return Ok(());
    }

    println!();
    println!("🔔 Alerts for {} ({})", user_id, alerts.len());
    println!("   ─────────────────────────────");
    for alert in &alerts {
        let marker = if alert.is_read { " " } else { "*" };
        println!(
            "  {}[{}] {} {} ({})",
            marker,
            alert.id,
            alert.severity.icon(),
            alert.title,
            alert.created_at.format("%Y-%m-%d %H:%M")
        );
        println!("        {}", truncate(&alert.body, 90));
        if let Some(due) = alert.due_at {
            println!("        Due: {}", due);
        }
    }
    println!();
    Ok(())
}

pub fn cmd_alerts_read(db: &Database, alert_id: i64) -> Result<()> {
    db.mark_alert_read(alert_id)
        .with_context(|| format!("Failed to mark alert {} as read", alert_id))?;
    println!("✅ Alert {} marked as read", alert_id);
    Ok(())
}
