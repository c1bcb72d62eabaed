//! Mock backend for testing
//!
//! Returns a fixed reply or a fixed degradation, so insight and score tests
//! can exercise both the model-assisted and the degraded paths without a
//! running model server.

use async_trait::async_trait;

use crate::error::{Degradable, DegradedReason};

use super::AIBackend;

/// Mock AI backend for testing
#[derive(Clone)]
pub struct MockBackend {
    outcome: Result<String, DegradedReason>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Backend with a generic two-line reply
    pub fn new() -> Self {
        Self {
            outcome: Ok("- Review your largest category this month\n- Set aside part of your income before spending".to_string()),
        }
    }

    /// Backend that always answers with `reply`
    pub fn with_reply(reply: &str) -> Self {
        Self {
            outcome: Ok(reply.to_string()),
        }
    }

    /// Backend whose completions always degrade with `reason`
    pub fn failing(reason: DegradedReason) -> Self {
        Self {
            outcome: Err(reason),
        }
    }
}

#[async_trait]
impl AIBackend for MockBackend {
    async fn complete(&self, _system: &str, _user: &str) -> Degradable<String> {
        self.outcome.clone()
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}
