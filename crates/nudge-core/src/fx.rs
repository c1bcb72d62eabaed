//! FX quote provider client
//!
//! `GET {base}/{pair}` returning `{"USDBRL": {"bid": "5.12", ...}}`. Any
//! failure means "quote unavailable" and the threshold checks are skipped.

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::config::ProviderConfig;
use crate::error::{Degradable, DegradedReason};
use crate::http::client_with_timeout;

/// Client for the currency quote provider
#[derive(Clone)]
pub struct FxClient {
    http_client: Client,
    base_url: String,
    pair: String,
}

impl FxClient {
    pub fn new(base_url: &str, pair: &str, timeout: Duration) -> Self {
        Self {
            http_client: client_with_timeout(timeout),
            base_url: base_url.trim_end_matches('/').to_string(),
            pair: pair.to_uppercase(),
        }
    }

    /// Build from provider config; None when no quote URL is configured
    pub fn from_config(providers: &ProviderConfig, timeout: Duration) -> Option<Self> {
        providers
            .fx_base_url
            .as_deref()
            .map(|url| Self::new(url, &providers.fx_pair, timeout))
    }

    pub fn pair(&self) -> &str {
        &self.pair
    }

    /// Fetch the current bid price for the configured pair
    pub async fn fetch_quote(&self) -> Degradable<f64> {
        let response = self
            .http_client
            .get(format!("{}/{}", self.base_url, self.pair))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DegradedReason::Status(status.as_u16()));
        }

        let body: Value = response.json().await?;
        let bid = parse_bid(&body, &self.pair)?;
        debug!(pair = %self.pair, bid = bid, "FX quote received");
        Ok(bid)
    }
}

/// Extract the bid from a quote body keyed by the pair without separators
pub fn parse_bid(body: &Value, pair: &str) -> Degradable<f64> {
    let key: String = pair.chars().filter(|c| c.is_ascii_alphabetic()).collect();

    let quote = body
        .get(&key)
        .ok_or_else(|| DegradedReason::Unparsable(format!("no quote for {}", key)))?;

    let bid = match quote.get("bid") {
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(Value::Number(n)) => n.as_f64(),
        _ => None,
    };

    bid.filter(|b| b.is_finite() && *b > 0.0)
        .ok_or_else(|| DegradedReason::Unparsable("missing or invalid bid".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_string_bid() {
        let body = json!({"USDBRL": {"code": "USD", "bid": "5.4321"}});
        assert_eq!(parse_bid(&body, "USD-BRL").unwrap(), 5.4321);
    }

    #[test]
    fn test_parse_numeric_bid() {
        let body = json!({"USDBRL": {"bid": 5.5}});
        assert_eq!(parse_bid(&body, "USD-BRL").unwrap(), 5.5);
    }

    #[test]
    fn test_unparsable_bodies() {
        assert!(matches!(
            parse_bid(&json!({}), "USD-BRL"),
            Err(DegradedReason::Unparsable(_))
        ));
        assert!(parse_bid(&json!({"USDBRL": {"bid": "abc"}}), "USD-BRL").is_err());
        assert!(parse_bid(&json!({"USDBRL": {"bid": "-1"}}), "USD-BRL").is_err());
    }

    #[test]
    fn test_other_pair_is_not_used() {
        let body = json!({"EURBRL": {"bid": "6.10"}});
        let err = parse_bid(&body, "USD-BRL").unwrap_err();
        assert!(matches!(err, DegradedReason::Unparsable(ref msg) if msg.contains("USDBRL")));
    }
}
