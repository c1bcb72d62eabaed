//! Ollama backend implementation

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Degradable, DegradedReason};
use crate::http::client_with_timeout;

use super::AIBackend;

/// Ollama backend using the `/api/generate` endpoint
#[derive(Clone)]
pub struct OllamaBackend {
    http_client: Client,
    base_url: String,
    model: String,
}

impl OllamaBackend {
    /// Create a new Ollama backend
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Self {
        Self {
            http_client: client_with_timeout(timeout),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    /// Create from environment variables
    pub fn from_env(timeout: Duration) -> Option<Self> {
        let host = std::env::var("OLLAMA_HOST").ok()?;
        let model = std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| "llama3.2".to_string());
        Some(Self::new(&host, &model, timeout))
    }
}

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    response: String,
}

#[async_trait]
impl AIBackend for OllamaBackend {
    async fn complete(&self, system: &str, user: &str) -> Degradable<String> {
        let request = OllamaRequest {
            model: &self.model,
            system,
            prompt: user,
            stream: false,
        };

        let response = self
            .http_client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DegradedReason::Status(status.as_u16()));
        }

        let ollama_response: OllamaResponse = response.json().await?;
        let text = ollama_response.response.trim().to_string();
        if text.is_empty() {
            return Err(DegradedReason::EmptyContent);
        }

        debug!(model = %self.model, chars = text.len(), "Ollama completion received");
        Ok(text)
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}
