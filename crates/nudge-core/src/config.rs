//! Engine configuration
//!
//! Sources, lowest to highest priority:
//! 1. Built-in defaults
//! 2. TOML file (`~/.local/share/nudge/config.toml` or an explicit path)
//! 3. Environment variables
//!
//! ```toml
//! [policy]
//! dedup_window_hours = 18
//! max_insights = 6
//! worker_limit = 8
//!
//! [providers]
//! fx_base_url = "https://economia.awesomeapi.com.br/json/last"
//! fx_pair = "USD-BRL"
//! push_gateway_url = "http://localhost:8787/push"
//! email_api_url = "https://api.resend.com"
//! email_from = "Nudge <alerts@nudge.local>"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Tunable policy constants
///
/// None of these are protocol requirements; they bound write volume, output
/// size and notification frequency.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Window in which an alert with the same type and title is not re-inserted
    pub dedup_window_hours: i64,
    /// Maximum merged insight lines per period
    pub max_insights: usize,
    /// Maximum lines taken from the language model
    pub max_model_lines: usize,
    /// Maximum rule-based recommendations on a score snapshot
    pub max_recommendations: usize,
    /// Maximum rows the classifier backfill touches per run
    pub backfill_limit: usize,
    /// Maximum users processed in parallel by a batch run
    pub worker_limit: usize,
    /// Timeout applied to every external HTTP call
    pub http_timeout_secs: u64,
    /// Minimum recurring-subscription total before it is worth an insight
    pub subscription_materiality: f64,
    /// Minimum delivery/food-service share of spend (percent) for an insight
    pub delivery_share_pct: f64,
    /// Share (percent) at which the top category is flagged as a concern
    pub top_category_concern_pct: f64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            dedup_window_hours: 18,
            max_insights: 6,
            max_model_lines: 3,
            max_recommendations: 6,
            backfill_limit: 100,
            worker_limit: 4,
            http_timeout_secs: 10,
            subscription_materiality: 30.0,
            delivery_share_pct: 8.0,
            top_category_concern_pct: 35.0,
        }
    }
}

/// External provider endpoints
///
/// Every provider is optional. A missing endpoint degrades the matching
/// feature instead of failing the run.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// FX quote base URL, the pair is appended as a path segment
    pub fx_base_url: Option<String>,
    /// Currency pair, e.g. "USD-BRL"
    pub fx_pair: String,
    /// Push gateway endpoint
    pub push_gateway_url: Option<String>,
    /// Link attached to push notifications
    pub app_url: String,
    /// Primary email API base URL
    pub email_api_url: Option<String>,
    /// Primary email API key
    pub email_api_key: Option<String>,
    /// Sender address for digests
    pub email_from: String,
    /// Secondary SMTP relay host
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
}

impl ProviderConfig {
    fn with_fallbacks(mut self) -> Self {
        if self.fx_pair.is_empty() {
            self.fx_pair = "USD-BRL".to_string();
        }
        if self.app_url.is_empty() {
            self.app_url = "/".to_string();
        }
        if self.email_from.is_empty() {
            self.email_from = "Nudge <alerts@nudge.local>".to_string();
        }
        if self.smtp_port == 0 {
            self.smtp_port = 587;
        }
        self
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub policy: PolicyConfig,
    pub providers: ProviderConfig,
}

impl EngineConfig {
    /// Default config file location
    pub fn default_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("nudge")
            .join("config.toml")
    }

    /// Parse a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(contents)?;
        Ok(config.normalized())
    }

    /// Load configuration from an optional file, then apply environment overrides
    ///
    /// An explicit path must exist. The default path is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(p) => {
                let contents = std::fs::read_to_string(p).map_err(|e| {
                    Error::Config(format!("Failed to read {}: {}", p.display(), e))
                })?;
                Self::from_toml_str(&contents)?
            }
            None => {
                let default = Self::default_path();
                match std::fs::read_to_string(&default) {
                    Ok(contents) => {
                        debug!(path = %default.display(), "Loaded engine config");
                        Self::from_toml_str(&contents)?
                    }
                    Err(_) => Self::default().normalized(),
                }
            }
        };
        Ok(config.apply_env())
    }

    /// Apply `NUDGE_*` environment overrides
    pub fn apply_env(mut self) -> Self {
        let p = &mut self.providers;
        override_opt(&mut p.fx_base_url, "NUDGE_FX_URL");
        override_string(&mut p.fx_pair, "NUDGE_FX_PAIR");
        override_opt(&mut p.push_gateway_url, "NUDGE_PUSH_GATEWAY");
        override_string(&mut p.app_url, "NUDGE_APP_URL");
        override_opt(&mut p.email_api_url, "NUDGE_EMAIL_API_URL");
        override_opt(&mut p.email_api_key, "NUDGE_EMAIL_API_KEY");
        override_string(&mut p.email_from, "NUDGE_EMAIL_FROM");
        override_opt(&mut p.smtp_host, "NUDGE_SMTP_HOST");
        override_opt(&mut p.smtp_username, "NUDGE_SMTP_USERNAME");
        override_opt(&mut p.smtp_password, "NUDGE_SMTP_PASSWORD");
        if let Some(port) = env_parse::<u16>("NUDGE_SMTP_PORT") {
            p.smtp_port = port;
        }

        let policy = &mut self.policy;
        if let Some(v) = env_parse::<i64>("NUDGE_DEDUP_WINDOW_HOURS") {
            policy.dedup_window_hours = v;
        }
        if let Some(v) = env_parse::<usize>("NUDGE_WORKER_LIMIT") {
            policy.worker_limit = v;
        }
        if let Some(v) = env_parse::<u64>("NUDGE_HTTP_TIMEOUT_SECS") {
            policy.http_timeout_secs = v;
        }
        if let Some(v) = env_parse::<usize>("NUDGE_BACKFILL_LIMIT") {
            policy.backfill_limit = v;
        }

        self.normalized()
    }

    /// Clamp policy values into usable ranges
    fn normalized(mut self) -> Self {
        let policy = &mut self.policy;
        if policy.dedup_window_hours < 0 {
            policy.dedup_window_hours = 0;
        }
        policy.max_insights = policy.max_insights.max(1);
        policy.max_model_lines = policy.max_model_lines.min(policy.max_insights);
        policy.worker_limit = policy.worker_limit.max(1);
        policy.http_timeout_secs = policy.http_timeout_secs.max(1);
        self.providers = self.providers.with_fallbacks();
        self
    }
}

fn override_opt(slot: &mut Option<String>, var: &str) {
    if let Ok(value) = std::env::var(var) {
        if !value.trim().is_empty() {
            *slot = Some(value);
        }
    }
}

fn override_string(slot: &mut String, var: &str) {
    if let Ok(value) = std::env::var(var) {
        if !value.trim().is_empty() {
            *slot = value;
        }
    }
}

fn env_parse<T: std::str::FromStr>(var: &str) -> Option<T> {
    let raw = std::env::var(var).ok()?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(var = var, value = %raw, "Ignoring unparsable environment override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default().normalized();
        assert_eq!(config.policy.dedup_window_hours, 18);
        assert_eq!(config.policy.max_insights, 6);
        assert_eq!(config.policy.max_model_lines, 3);
        assert_eq!(config.policy.backfill_limit, 100);
        assert_eq!(config.providers.fx_pair, "USD-BRL");
        assert!(config.providers.fx_base_url.is_none());
    }

    #[test]
    fn test_partial_toml() {
        let config = EngineConfig::from_toml_str(
            r#"
            [policy]
            dedup_window_hours = 6
            max_insights = 2

            [providers]
            fx_base_url = "http://localhost:9000/json/last"
            "#,
        )
        .unwrap();

        assert_eq!(config.policy.dedup_window_hours, 6);
        assert_eq!(config.policy.max_insights, 2);
        // Model lines can never exceed the overall cap
        assert_eq!(config.policy.max_model_lines, 2);
        assert_eq!(config.policy.worker_limit, 4);
        assert_eq!(
            config.providers.fx_base_url.as_deref(),
            Some("http://localhost:9000/json/last")
        );
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = EngineConfig::from_toml_str("[policy\nbroken").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_load_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[policy]\nworker_limit = 0").unwrap();

        let config = EngineConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.policy.worker_limit, 1);
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let result = EngineConfig::load(Some(Path::new("/nonexistent/nudge.toml")));
        assert!(result.is_err());
    }
}
