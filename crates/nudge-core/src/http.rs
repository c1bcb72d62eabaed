//! Shared HTTP client construction for provider calls

use std::time::Duration;

use reqwest::Client;
use tracing::warn;

/// Build a client whose every request is bounded by `timeout`
pub(crate) fn client_with_timeout(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .user_agent(concat!("nudge/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "Failed to build HTTP client, using defaults");
            Client::new()
        })
}
