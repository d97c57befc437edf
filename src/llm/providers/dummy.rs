//! Dummy LLM provider: no network, for tests and offline runs.
//!
//! Replies with a fixed text when one is configured, otherwise echoes the
//! last turn back prefixed with `[echo]`. Every request is recorded so
//! callers can inspect exactly what would have been sent.

use std::sync::{Arc, Mutex};

use crate::llm::{CompletionRequest, LlmResponse, ProviderError};

#[derive(Debug, Clone, Default)]
pub struct DummyProvider {
    reply: Option<String>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl DummyProvider {
    /// Echo provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider that always answers `reply`.
    pub fn with_reply(reply: impl Into<String>) -> Self {
        Self { reply: Some(reply.into()), ..Self::default() }
    }

    /// Requests seen so far, oldest first. Clones share the same log.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        match self.requests.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub async fn complete(&self, request: &CompletionRequest) -> Result<LlmResponse, ProviderError> {
        match self.requests.lock() {
            Ok(mut guard) => guard.push(request.clone()),
            Err(poisoned) => poisoned.into_inner().push(request.clone()),
        }

        let text = match &self.reply {
            Some(reply) => reply.clone(),
            None => {
                let last = request.turns.last().map(|t| t.content.as_str()).unwrap_or_default();
                format!("[echo] {last}")
            }
        };
        Ok(LlmResponse { text, usage: None })
    }
}
