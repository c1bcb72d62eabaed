//! Automation settings commands (show, set)

use anyhow::{Context, Result};
use nudge_core::{AutomationSettings, Database, SettingsPatch};

/// Raw `settings set` flags before validation
#[derive(Debug, Default)]
pub struct SettingsArgs {
    pub push: Option<bool>,
    pub email: Option<bool>,
    pub internal: Option<bool>,
    pub card_due_days: Option<u32>,
    pub dollar_upper: Option<String>,
    pub dollar_lower: Option<String>,
    pub investment_drop: Option<f64>,
    pub spending_spike: Option<f64>,
    pub monthly_report: Option<bool>,
    pub market_refresh: Option<bool>,
    pub notify_email: Option<String>,
}

impl SettingsArgs {
    /// Convert to a patch; "none" clears a nullable field
    pub fn into_patch(self) -> Result<SettingsPatch> {
        Ok(SettingsPatch {
            push_enabled: self.push,
            email_enabled: self.email,
            internal_enabled: self.internal,
            card_due_days: self.card_due_days,
            dollar_upper: self
                .dollar_upper
                .as_deref()
                .map(parse_clearable_amount)
                .transpose()?,
            dollar_lower: self
                .dollar_lower
                .as_deref()
                .map(parse_clearable_amount)
                .transpose()?,
            investment_drop_pct: self.investment_drop,
            spending_spike_pct: self.spending_spike,
            monthly_report_enabled: self.monthly_report,
            market_refresh_enabled: self.market_refresh,
            notify_email: self.notify_email.as_deref().map(parse_clearable_text),
            extras: None,
        })
    }
}

/// Parse an amount flag where "none" (or empty) means clear
pub fn parse_clearable_amount(value: &str) -> Result<Option<f64>> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    let amount: f64 = value
        .replace(',', ".")
        .parse()
        .with_context(|| format!("Invalid amount: {}", value))?;
    Ok(Some(amount))
}

fn parse_clearable_text(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(value.to_string())
    }
}

pub fn cmd_settings_show(db: &Database, user_id: &str) -> Result<()> {
    let settings = db
        .get_or_create_settings(user_id)
        .context("Failed to load settings")?;
    print_settings(&settings);
    Ok(())
}

pub fn cmd_settings_set(db: &Database, user_id: &str, patch: &SettingsPatch) -> Result<()> {
    let settings = db
        .update_settings(user_id, patch)
        .context("Failed to update settings")?;
    println!("✅ Settings updated");
    print_settings(&settings);
    Ok(())
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}

fn optional<T: std::fmt::Display>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn print_settings(s: &AutomationSettings) {
    println!();
    println!("⚙️  Automation settings for {}", s.user_id);
    println!("   ─────────────────────────────");
    println!("   Push:              {}", on_off(s.push_enabled));
    println!("   Email:             {}", on_off(s.email_enabled));
    println!("   In-app:            {}", on_off(s.internal_enabled));
    println!("   Notify email:      {}", optional(&s.notify_email));
    println!("   Card due days:     {}", s.card_due_days);
    println!("   FX upper:          {}", optional(&s.dollar_upper));
    println!("   FX lower:          {}", optional(&s.dollar_lower));
    println!("   Investment drop:   {}%", s.investment_drop_pct);
    println!("   Spending spike:    {}%", s.spending_spike_pct);
    println!("   Monthly report:    {}", on_off(s.monthly_report_enabled));
    println!("   Market refresh:    {}", on_off(s.market_refresh_enabled));
    if let Some(at) = s.last_run_at {
        println!();
        println!(
            "   Last run: {} ({})",
            at.format("%Y-%m-%d %H:%M"),
            optional(&s.last_status.map(|st| st.as_str()))
        );
        if let Some(error) = &s.last_error {
            println!("   Last error: {}", error);
        }
    }
    println!();
}
