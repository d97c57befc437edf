//! Chat subsystem: per-channel sessions over a shared [`ChatCore`].
//!
//! ```text
//! SessionRegistry ── get_or_create(channel_id) ──▶ Arc<Session>
//!                                                     │ ask / chat / summarize
//!                                                     ▼
//!                                            ChatCore::complete(op, turns)
//!                                                     │
//!                                                     ▼
//!                                               LlmProvider
//! ```
//!
//! [`ChatCore`] is immutable and shared by every session: the provider, the
//! prompt bodies and the model names are fixed at startup.

pub mod prompt;
pub mod registry;
pub mod session;

pub use prompt::PromptSet;
pub use registry::SessionRegistry;
pub use session::{ChatMessage, END_SENTINEL, Session};

use thiserror::Error;
use tracing::debug;

use crate::config::ModelConfig;
use crate::llm::{CompletionRequest, LlmProvider, ProviderError, Turn};

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ChatError {
    /// No completion credential configured; raised before any network call.
    #[error("OpenAI API key not found")]
    MissingApiKey,
    #[error(transparent)]
    Completion(#[from] ProviderError),
}

// ── Operation ─────────────────────────────────────────────────────────────────

/// Which session operation a completion belongs to. Selects the system
/// prompt and the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Chat,
    Ask,
    Summary,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Chat => "chat",
            Operation::Ask => "ask",
            Operation::Summary => "summary",
        }
    }
}

// ── ChatCore ──────────────────────────────────────────────────────────────────

/// Shared, immutable configuration behind every [`Session`].
#[derive(Debug)]
pub struct ChatCore {
    provider: LlmProvider,
    prompts: PromptSet,
    models: ModelConfig,
    credential_configured: bool,
}

impl ChatCore {
    /// `credential_configured` reflects whether `OPENAI_API_KEY` was set; it
    /// is checked at the start of every operation.
    pub fn new(
        provider: LlmProvider,
        prompts: PromptSet,
        models: ModelConfig,
        credential_configured: bool,
    ) -> Self {
        Self { provider, prompts, models, credential_configured }
    }

    pub fn models(&self) -> &ModelConfig {
        &self.models
    }

    /// Fail with [`ChatError::MissingApiKey`] when no credential is set.
    pub fn require_credential(&self) -> Result<(), ChatError> {
        if self.credential_configured {
            Ok(())
        } else {
            Err(ChatError::MissingApiKey)
        }
    }

    /// Build the request for `op` over `turns`. Pure.
    pub fn request(&self, op: Operation, turns: Vec<Turn>) -> CompletionRequest {
        let (system, model) = match op {
            Operation::Chat => (&self.prompts.chat, &self.models.chat),
            Operation::Ask => (&self.prompts.ask, &self.models.ask),
            Operation::Summary => (&self.prompts.summary, &self.models.summary),
        };
        CompletionRequest { model: model.clone(), system: system.clone(), turns }
    }

    /// One completion round-trip. Endpoint errors are passed through
    /// unmodified.
    pub async fn complete(&self, op: Operation, turns: Vec<Turn>) -> Result<String, ChatError> {
        self.require_credential()?;
        let request = self.request(op, turns);
        debug!(
            op = op.as_str(),
            model = %request.model,
            turns = request.turns.len(),
            preview = ?request.turns.iter().map(|t| preview(&t.content)).collect::<Vec<_>>(),
            "create chat completion"
        );
        let response = self.provider.complete(&request).await?;
        Ok(response.text)
    }
}

/// First ten characters of a turn, for debug logs.
fn preview(content: &str) -> String {
    content.chars().take(10).collect()
}
