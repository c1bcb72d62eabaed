//! Push gateway client
//!
//! One `POST {gateway}` per subscription endpoint with
//! `{endpoint, title, body, url, tag}`. The tag is the alert type so the
//! device collapses repeats of the same kind.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use crate::config::ProviderConfig;
use crate::error::{Degradable, DegradedReason};
use crate::http::client_with_timeout;
use crate::models::AutomationEvent;

#[derive(Debug, Serialize)]
struct PushPayload<'a> {
    endpoint: &'a str,
    title: &'a str,
    body: &'a str,
    url: &'a str,
    tag: &'a str,
}

/// Client for the push gateway
#[derive(Clone)]
pub struct PushClient {
    http_client: Client,
    gateway_url: String,
    app_url: String,
}

impl PushClient {
    pub fn new(gateway_url: &str, app_url: &str, timeout: Duration) -> Self {
        Self {
            http_client: client_with_timeout(timeout),
            gateway_url: gateway_url.to_string(),
            app_url: app_url.to_string(),
        }
    }

    /// Build from provider config; None when no gateway is configured
    pub fn from_config(providers: &ProviderConfig, timeout: Duration) -> Option<Self> {
        providers
            .push_gateway_url
            .as_deref()
            .map(|url| Self::new(url, &providers.app_url, timeout))
    }

    /// Deliver one event to one subscription endpoint
    pub async fn send(&self, endpoint: &str, event: &AutomationEvent) -> Degradable<()> {
        let payload = PushPayload {
            endpoint,
            title: &event.title,
            body: &event.body,
            url: &self.app_url,
            tag: event.alert_type.as_str(),
        };

        let response = self
            .http_client
            .post(&self.gateway_url)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DegradedReason::Status(status.as_u16()));
        }
        debug!(tag = payload.tag, "Push delivered");
        Ok(())
    }
}
