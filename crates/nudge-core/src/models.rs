//! Domain models for Nudge

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Kind of a ledger entry
///
/// Amounts are stored as non-negative magnitudes; the kind carries direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Income,
    Expense,
    Adjustment,
    CardPayment,
    Transfer,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
            Self::Adjustment => "adjustment",
            Self::CardPayment => "card_payment",
            Self::Transfer => "transfer",
        }
    }

    /// Income-like kinds count toward the income total
    pub fn is_inflow(&self) -> bool {
        matches!(self, Self::Income | Self::Adjustment)
    }
}

impl std::str::FromStr for EntryKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            "adjustment" => Ok(Self::Adjustment),
            "card_payment" | "cardpayment" => Ok(Self::CardPayment),
            "transfer" => Ok(Self::Transfer),
            _ => Err(format!("Unknown entry kind: {}", s)),
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A ledger entry owned by the record store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub user_id: String,
    pub occurred_at: NaiveDate,
    pub kind: EntryKind,
    pub description: String,
    pub category: Option<String>,
    pub amount: f64,
    pub card_id: Option<i64>,
    pub tags: Vec<String>,
}

/// New ledger entry for insertion
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub user_id: String,
    pub occurred_at: NaiveDate,
    pub kind: EntryKind,
    pub description: String,
    pub category: Option<String>,
    pub amount: f64,
    pub card_id: Option<i64>,
    pub tags: Vec<String>,
}

impl NewLedgerEntry {
    pub fn new(
        user_id: &str,
        occurred_at: NaiveDate,
        kind: EntryKind,
        description: &str,
        amount: f64,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            occurred_at,
            kind,
            description: description.to_string(),
            category: None,
            amount,
            card_id: None,
            tags: Vec::new(),
        }
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    pub fn with_card(mut self, card_id: i64) -> Self {
        self.card_id = Some(card_id);
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }
}

/// Direction of an investment operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvestmentOperation {
    Buy,
    Sell,
}

impl InvestmentOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

impl std::str::FromStr for InvestmentOperation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "buy" => Ok(Self::Buy),
            "sell" => Ok(Self::Sell),
            _ => Err(format!("Unknown investment operation: {}", s)),
        }
    }
}

/// An investment position (read-only to the engine)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestmentPosition {
    pub id: i64,
    pub user_id: String,
    pub asset_name: String,
    pub asset_type: String,
    pub quantity: f64,
    pub current_price: f64,
    pub average_price: f64,
    pub current_amount: f64,
    pub invested_amount: f64,
    pub operation: InvestmentOperation,
    /// Oldest first
    pub price_history: Vec<f64>,
    pub updated_at: NaiveDate,
}

impl InvestmentPosition {
    pub fn is_active(&self) -> bool {
        self.quantity > 0.0
    }

    /// Price to compare the current price against
    ///
    /// The most recent history price that differs from the current price,
    /// falling back to the average cost.
    pub fn previous_price(&self) -> Option<f64> {
        let from_history = self
            .price_history
            .iter()
            .rev()
            .copied()
            .find(|p| p.is_finite() && *p > 0.0 && (*p - self.current_price).abs() > f64::EPSILON);

        from_history.or_else(|| {
            (self.average_price.is_finite() && self.average_price > 0.0)
                .then_some(self.average_price)
        })
    }
}

/// New investment position for insertion
#[derive(Debug, Clone)]
pub struct NewInvestmentPosition {
    pub user_id: String,
    pub asset_name: String,
    pub asset_type: String,
    pub quantity: f64,
    pub current_price: f64,
    pub average_price: f64,
    pub invested_amount: f64,
    pub operation: InvestmentOperation,
    pub price_history: Vec<f64>,
    pub updated_at: NaiveDate,
}

/// A credit card (read-only to the engine)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    pub id: i64,
    pub user_id: String,
    pub name: String,
    pub issuer: String,
    pub limit_total: f64,
    pub closing_day: u32,
    pub due_day: u32,
    pub archived: bool,
}

/// Outcome of the last automation run for a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Ok,
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
        }
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "ok" => Ok(Self::Ok),
            "error" => Ok(Self::Error),
            _ => Err(format!("Unknown run status: {}", s)),
        }
    }
}

/// Per-user automation settings, always fully populated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationSettings {
    pub user_id: String,
    pub push_enabled: bool,
    pub email_enabled: bool,
    pub internal_enabled: bool,
    /// Days before a due/closing date that trigger a card event (1-10)
    pub card_due_days: u32,
    pub dollar_upper: Option<f64>,
    pub dollar_lower: Option<f64>,
    /// Drawdown percentage that triggers an investment event (0.5-50)
    pub investment_drop_pct: f64,
    /// Month-over-month growth percentage that triggers a spike event (5-100)
    pub spending_spike_pct: f64,
    pub monthly_report_enabled: bool,
    pub market_refresh_enabled: bool,
    pub notify_email: Option<String>,
    /// Forward-compatible extras, not validated
    pub extras: serde_json::Map<String, serde_json::Value>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_status: Option<RunStatus>,
    pub last_error: Option<String>,
}

impl AutomationSettings {
    pub const CARD_DUE_DAYS: (u32, u32) = (1, 10);
    pub const INVESTMENT_DROP_PCT: (f64, f64) = (0.5, 50.0);
    pub const SPENDING_SPIKE_PCT: (f64, f64) = (5.0, 100.0);

    /// Defaults for a user with no stored settings
    pub fn defaults(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            push_enabled: true,
            email_enabled: false,
            internal_enabled: true,
            card_due_days: 3,
            dollar_upper: None,
            dollar_lower: None,
            investment_drop_pct: 5.0,
            spending_spike_pct: 20.0,
            monthly_report_enabled: true,
            market_refresh_enabled: true,
            notify_email: None,
            extras: serde_json::Map::new(),
            last_run_at: None,
            last_status: None,
            last_error: None,
        }
    }

    /// Build a full settings value from a partial one
    ///
    /// Missing fields take defaults, bounded fields are clamped, and
    /// non-finite or non-positive thresholds are dropped.
    pub fn normalize(user_id: &str, patch: &SettingsPatch) -> Self {
        Self::defaults(user_id).merged(patch)
    }

    /// Apply a patch on top of these settings, re-normalizing the result
    pub fn merged(&self, patch: &SettingsPatch) -> Self {
        let mut next = self.clone();
        if let Some(v) = patch.push_enabled {
            next.push_enabled = v;
        }
        if let Some(v) = patch.email_enabled {
            next.email_enabled = v;
        }
        if let Some(v) = patch.internal_enabled {
            next.internal_enabled = v;
        }
        if let Some(v) = patch.card_due_days {
            next.card_due_days = v;
        }
        if let Some(v) = patch.dollar_upper {
            next.dollar_upper = v;
        }
        if let Some(v) = patch.dollar_lower {
            next.dollar_lower = v;
        }
        if let Some(v) = patch.investment_drop_pct {
            next.investment_drop_pct = v;
        }
        if let Some(v) = patch.spending_spike_pct {
            next.spending_spike_pct = v;
        }
        if let Some(v) = patch.monthly_report_enabled {
            next.monthly_report_enabled = v;
        }
        if let Some(v) = patch.market_refresh_enabled {
            next.market_refresh_enabled = v;
        }
        if let Some(v) = &patch.notify_email {
            next.notify_email = v.clone();
        }
        if let Some(extras) = &patch.extras {
            for (k, v) in extras {
                next.extras.insert(k.clone(), v.clone());
            }
        }
        next.clamped()
    }

    fn clamped(mut self) -> Self {
        let (lo, hi) = Self::CARD_DUE_DAYS;
        self.card_due_days = self.card_due_days.clamp(lo, hi);

        let (lo, hi) = Self::INVESTMENT_DROP_PCT;
        self.investment_drop_pct = clamp_or(self.investment_drop_pct, lo, hi, 5.0);

        let (lo, hi) = Self::SPENDING_SPIKE_PCT;
        self.spending_spike_pct = clamp_or(self.spending_spike_pct, lo, hi, 20.0);

        self.dollar_upper = self.dollar_upper.filter(|v| v.is_finite() && *v > 0.0);
        self.dollar_lower = self.dollar_lower.filter(|v| v.is_finite() && *v > 0.0);
        self.notify_email = self
            .notify_email
            .map(|e| e.trim().to_string())
            .filter(|e| e.contains('@'));
        self
    }
}

fn clamp_or(value: f64, lo: f64, hi: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value.clamp(lo, hi)
    } else {
        fallback
    }
}

/// Partial settings as supplied by a user update or a stored row
///
/// Nullable thresholds use a nested option: `Some(None)` clears the value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsPatch {
    pub push_enabled: Option<bool>,
    pub email_enabled: Option<bool>,
    pub internal_enabled: Option<bool>,
    pub card_due_days: Option<u32>,
    pub dollar_upper: Option<Option<f64>>,
    pub dollar_lower: Option<Option<f64>>,
    pub investment_drop_pct: Option<f64>,
    pub spending_spike_pct: Option<f64>,
    pub monthly_report_enabled: Option<bool>,
    pub market_refresh_enabled: Option<bool>,
    pub notify_email: Option<Option<String>>,
    pub extras: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Severity of an insight, event or alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Self::Info => "ℹ️",
            Self::Success => "✅",
            Self::Warning => "⚠️",
            Self::Critical => "🚨",
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(Self::Info),
            "success" => Ok(Self::Success),
            "warning" => Ok(Self::Warning),
            "critical" => Ok(Self::Critical),
            _ => Err(format!("Unknown severity: {}", s)),
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where an insight line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightSource {
    Rule,
    Model,
}

impl InsightSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rule => "rule",
            Self::Model => "model",
        }
    }
}

impl std::str::FromStr for InsightSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "rule" => Ok(Self::Rule),
            "model" => Ok(Self::Model),
            _ => Err(format!("Unknown insight source: {}", s)),
        }
    }
}

/// A persisted insight line for one user and period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightRecord {
    pub user_id: String,
    /// Canonical YYYY-MM
    pub period: String,
    pub insight_type: String,
    pub title: String,
    pub body: String,
    pub severity: Severity,
    pub source: InsightSource,
    pub metadata: serde_json::Value,
}

/// The five pillar scores, each in [0, 100]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PillarScores {
    pub punctuality: f64,
    pub limit_usage: f64,
    pub investments: f64,
    pub history: f64,
    pub spending_control: f64,
}

/// Risk band derived from the overall score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Excellent,
    Good,
    NeedsAttention,
    HighRisk,
}

impl RiskLevel {
    pub fn from_score(score: u8) -> Self {
        match score {
            85..=u8::MAX => Self::Excellent,
            70..=84 => Self::Good,
            50..=69 => Self::NeedsAttention,
            _ => Self::HighRisk,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::NeedsAttention => "needs_attention",
            Self::HighRisk => "high_risk",
        }
    }
}

impl std::str::FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "excellent" => Ok(Self::Excellent),
            "good" => Ok(Self::Good),
            "needs_attention" => Ok(Self::NeedsAttention),
            "high_risk" => Ok(Self::HighRisk),
            _ => Err(format!("Unknown risk level: {}", s)),
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Daily relationship/health score snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipScoreSnapshot {
    pub user_id: String,
    pub reference_date: NaiveDate,
    /// Canonical YYYY-MM of the reference date
    pub month_ref: String,
    pub score: u8,
    pub pillars: PillarScores,
    pub risk_level: RiskLevel,
    pub recommendations: Vec<String>,
    pub model_recommendations: Vec<String>,
    pub indicators: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

/// Types of alerts the engine can raise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    ForecastNegative,
    SpendingSpike,
    FxAbove,
    FxBelow,
    CardDue,
    CardClosing,
    InvestmentDrop,
    DelayRisk,
    LimitHigh,
    ScoreDrop,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ForecastNegative => "forecast_negative",
            Self::SpendingSpike => "spending_spike",
            Self::FxAbove => "fx_above",
            Self::FxBelow => "fx_below",
            Self::CardDue => "card_due",
            Self::CardClosing => "card_closing",
            Self::InvestmentDrop => "investment_drop",
            Self::DelayRisk => "delay_risk",
            Self::LimitHigh => "limit_high",
            Self::ScoreDrop => "score_drop",
        }
    }
}

impl std::str::FromStr for AlertType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "forecast_negative" => Ok(Self::ForecastNegative),
            "spending_spike" => Ok(Self::SpendingSpike),
            "fx_above" => Ok(Self::FxAbove),
            "fx_below" => Ok(Self::FxBelow),
            "card_due" => Ok(Self::CardDue),
            "card_closing" => Ok(Self::CardClosing),
            "investment_drop" => Ok(Self::InvestmentDrop),
            "delay_risk" => Ok(Self::DelayRisk),
            "limit_high" => Ok(Self::LimitHigh),
            "score_drop" => Ok(Self::ScoreDrop),
            _ => Err(format!("Unknown alert type: {}", s)),
        }
    }
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A transient signal that a threshold rule was crossed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationEvent {
    pub alert_type: AlertType,
    pub title: String,
    pub body: String,
    pub severity: Severity,
    pub due_at: Option<NaiveDate>,
    pub card_id: Option<i64>,
}

impl AutomationEvent {
    pub fn new(alert_type: AlertType, severity: Severity, title: String, body: String) -> Self {
        Self {
            alert_type,
            title,
            body,
            severity,
            due_at: None,
            card_id: None,
        }
    }

    pub fn with_card(mut self, card_id: i64, due_at: NaiveDate) -> Self {
        self.card_id = Some(card_id);
        self.due_at = Some(due_at);
        self
    }
}

/// A persisted alert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRecord {
    pub id: i64,
    pub user_id: String,
    pub card_id: Option<i64>,
    pub alert_type: AlertType,
    pub title: String,
    pub body: String,
    pub severity: Severity,
    pub due_at: Option<NaiveDate>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Display metadata for a spending category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryMeta {
    pub normalized_name: String,
    pub name: String,
    pub icon: String,
    pub color: String,
}

/// A registered push endpoint for a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushSubscription {
    pub id: i64,
    pub user_id: String,
    pub endpoint: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_normalize_clamps_bounds() {
        let patch = SettingsPatch {
            card_due_days: Some(30),
            investment_drop_pct: Some(0.1),
            spending_spike_pct: Some(250.0),
            dollar_upper: Some(Some(f64::NAN)),
            notify_email: Some(Some("  me@example.com ".into())),
            ..Default::default()
        };
        let settings = AutomationSettings::normalize("u1", &patch);

        assert_eq!(settings.card_due_days, 10);
        assert_eq!(settings.investment_drop_pct, 0.5);
        assert_eq!(settings.spending_spike_pct, 100.0);
        assert_eq!(settings.dollar_upper, None);
        assert_eq!(settings.notify_email.as_deref(), Some("me@example.com"));
    }

    #[test]
    fn test_settings_patch_clears_threshold() {
        let base = AutomationSettings::normalize(
            "u1",
            &SettingsPatch {
                dollar_lower: Some(Some(4.8)),
                ..Default::default()
            },
        );
        assert_eq!(base.dollar_lower, Some(4.8));

        let cleared = base.merged(&SettingsPatch {
            dollar_lower: Some(None),
            ..Default::default()
        });
        assert_eq!(cleared.dollar_lower, None);
        // Untouched fields survive
        assert_eq!(cleared.card_due_days, base.card_due_days);
    }

    #[test]
    fn test_risk_level_bands() {
        assert_eq!(RiskLevel::from_score(100), RiskLevel::Excellent);
        assert_eq!(RiskLevel::from_score(85), RiskLevel::Excellent);
        assert_eq!(RiskLevel::from_score(84), RiskLevel::Good);
        assert_eq!(RiskLevel::from_score(70), RiskLevel::Good);
        assert_eq!(RiskLevel::from_score(69), RiskLevel::NeedsAttention);
        assert_eq!(RiskLevel::from_score(50), RiskLevel::NeedsAttention);
        assert_eq!(RiskLevel::from_score(49), RiskLevel::HighRisk);
        assert_eq!(RiskLevel::from_score(0), RiskLevel::HighRisk);
    }

    #[test]
    fn test_previous_price_prefers_history() {
        let mut position = InvestmentPosition {
            id: 1,
            user_id: "u1".into(),
            asset_name: "ACME3".into(),
            asset_type: "stock".into(),
            quantity: 10.0,
            current_price: 80.0,
            average_price: 90.0,
            current_amount: 800.0,
            invested_amount: 900.0,
            operation: InvestmentOperation::Buy,
            price_history: vec![95.0, 100.0, 80.0],
            updated_at: NaiveDate::from_ymd_opt(2024, 5, 10).unwrap(),
        };
        assert_eq!(position.previous_price(), Some(100.0));

        position.price_history.clear();
        assert_eq!(position.previous_price(), Some(90.0));

        position.average_price = 0.0;
        assert_eq!(position.previous_price(), None);
    }

    #[test]
    fn test_alert_type_roundtrip_names() {
        for t in [
            AlertType::ForecastNegative,
            AlertType::CardClosing,
            AlertType::ScoreDrop,
        ] {
            assert_eq!(t.as_str().parse::<AlertType>().unwrap(), t);
        }
    }
}
