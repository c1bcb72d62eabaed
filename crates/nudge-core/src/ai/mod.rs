//! Pluggable language-model backend
//!
//! The engine only needs short free-text completions (insight lines and
//! score recommendations), so the backend surface is a single `complete`
//! call plus identity accessors. Every call returns
//! [`Degradable`]: callers substitute an empty list on failure.
//!
//! # Architecture
//!
//! - `AIBackend` trait: the interface every backend implements
//! - `AIClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backends: `OllamaBackend`, `OpenAICompatibleBackend`, `MockBackend`
//!
//! # Configuration
//!
//! Environment variables:
//! - `AI_BACKEND`: Backend to use (ollama, openai_compatible, mock). Default: ollama
//! - `OLLAMA_HOST`: Ollama server URL (required for ollama backend)
//! - `OLLAMA_MODEL`: Model name (default: llama3.2)
//! - `OPENAI_COMPATIBLE_HOST`: Server URL (required for openai_compatible backend)
//! - `OPENAI_COMPATIBLE_MODEL`: Model name (default: gpt-4o-mini)
//! - `OPENAI_COMPATIBLE_API_KEY`: API key if required (optional)

mod mock;
mod ollama;
mod openai_compatible;
pub mod parsing;

pub use mock::MockBackend;
pub use ollama::OllamaBackend;
pub use openai_compatible::OpenAICompatibleBackend;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Degradable;

/// Interface for all language-model backends
#[async_trait]
pub trait AIBackend: Send + Sync {
    /// Complete a system + user prompt into free text
    async fn complete(&self, system: &str, user: &str) -> Degradable<String>;

    /// Model name (for logging)
    fn model(&self) -> &str;

    /// Host URL (for logging)
    fn host(&self) -> &str;
}

/// Concrete AI client enum
#[derive(Clone)]
pub enum AIClient {
    /// Ollama backend (`/api/generate`)
    Ollama(OllamaBackend),
    /// OpenAI-compatible backend (`/v1/chat/completions`)
    OpenAICompatible(OpenAICompatibleBackend),
    /// Mock backend for testing
    Mock(MockBackend),
}

impl AIClient {
    /// Create an AI client from environment variables
    ///
    /// Returns None if the selected backend's host variable is not set, in
    /// which case model-assisted features degrade to empty output.
    pub fn from_env(timeout: Duration) -> Option<Self> {
        let backend = std::env::var("AI_BACKEND").unwrap_or_else(|_| "ollama".to_string());

        match backend.to_lowercase().as_str() {
            "ollama" => OllamaBackend::from_env(timeout).map(AIClient::Ollama),
            "openai_compatible" | "openai" | "vllm" | "localai" | "llamacpp" => {
                OpenAICompatibleBackend::from_env(timeout).map(AIClient::OpenAICompatible)
            }
            "mock" => Some(AIClient::Mock(MockBackend::new())),
            _ => {
                tracing::warn!(backend = %backend, "Unknown AI_BACKEND, falling back to ollama");
                OllamaBackend::from_env(timeout).map(AIClient::Ollama)
            }
        }
    }

    /// Create a mock backend for testing
    pub fn mock() -> Self {
        AIClient::Mock(MockBackend::new())
    }
}

#[async_trait]
impl AIBackend for AIClient {
    async fn complete(&self, system: &str, user: &str) -> Degradable<String> {
        match self {
            AIClient::Ollama(b) => b.complete(system, user).await,
            AIClient::OpenAICompatible(b) => b.complete(system, user).await,
            AIClient::Mock(b) => b.complete(system, user).await,
        }
    }

    fn model(&self) -> &str {
        match self {
            AIClient::Ollama(b) => b.model(),
            AIClient::OpenAICompatible(b) => b.model(),
            AIClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            AIClient::Ollama(b) => b.host(),
            AIClient::OpenAICompatible(b) => b.host(),
            AIClient::Mock(b) => b.host(),
        }
    }
}

/// Ask the model for up to `max_lines` short lines
///
/// Missing client, failed call and unusable output all yield an empty list;
/// the reason is returned alongside for run warnings.
pub async fn complete_lines(
    client: Option<&AIClient>,
    system: &str,
    user: &str,
    max_lines: usize,
) -> (Vec<String>, Option<crate::error::DegradedReason>) {
    use crate::error::DegradedReason;

    let Some(client) = client else {
        return (Vec::new(), Some(DegradedReason::NotConfigured("language model")));
    };

    match client.complete(system, user).await {
        Ok(text) => {
            let lines = parsing::parse_lines(&text, max_lines);
            if lines.is_empty() {
                (lines, Some(DegradedReason::EmptyContent))
            } else {
                (lines, None)
            }
        }
        Err(reason) => {
            tracing::warn!(
                model = client.model(),
                host = client.host(),
                reason = %reason,
                "Model completion degraded"
            );
            (Vec::new(), Some(reason))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DegradedReason;

    #[test]
    fn test_ai_client_mock() {
        let client = AIClient::mock();
        assert_eq!(client.model(), "mock");
        assert_eq!(client.host(), "mock://localhost");
    }

    #[tokio::test]
    async fn test_complete_lines_without_client_degrades() {
        let (lines, reason) = complete_lines(None, "sys", "user", 3).await;
        assert!(lines.is_empty());
        assert_eq!(reason, Some(DegradedReason::NotConfigured("language model")));
    }

    #[tokio::test]
    async fn test_complete_lines_caps_and_cleans() {
        let client = AIClient::Mock(MockBackend::with_reply(
            "1. Spending on food rose sharply\n- ok\n* Consider a budget for delivery apps\n2) Review your streaming plans\n3. Keep the emergency fund growing",
        ));
        let (lines, reason) = complete_lines(Some(&client), "sys", "user", 3).await;
        assert!(reason.is_none());
        assert_eq!(
            lines,
            vec![
                "Spending on food rose sharply",
                "Consider a budget for delivery apps",
                "Review your streaming plans",
            ]
        );
    }

    #[tokio::test]
    async fn test_complete_lines_failure_is_empty() {
        let client = AIClient::Mock(MockBackend::failing(DegradedReason::Status(500)));
        let (lines, reason) = complete_lines(Some(&client), "sys", "user", 3).await;
        assert!(lines.is_empty());
        assert_eq!(reason, Some(DegradedReason::Status(500)));
    }
}
