//! Per-channel chat session.
//!
//! A [`Session`] turns a window of raw channel messages into role-tagged
//! [`Turn`]s and runs one of three operations against the shared
//! [`ChatCore`]. Sessions carry no conversation state of their own; callers
//! re-supply history on every call. The only mutable state is the
//! auto-reply pair, changed out of band by channel commands.
//!
//! # The `<END>` sentinel
//!
//! The chat prompt lets the model answer with the literal [`END_SENTINEL`]
//! to stay silent. [`Session::chat`] maps that to `None`. A reply that is
//! genuinely meant to be the text `<END>` cannot be told apart; this is an
//! accepted limitation of the protocol.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tracing::{debug, info};

use super::{ChatCore, ChatError, Operation};
use crate::llm::Turn;

/// Completion text meaning "send nothing".
pub const END_SENTINEL: &str = "<END>";

/// A raw platform message, as seen by the formatting step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub author_id: String,
    pub display_name: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(
        author_id: impl Into<String>,
        display_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            author_id: author_id.into(),
            display_name: display_name.into(),
            content: content.into(),
        }
    }
}

pub struct Session {
    channel_id: String,
    agent_id: String,
    auto_reply: AtomicBool,
    auto_reply_window: AtomicUsize,
    core: Arc<ChatCore>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("channel_id", &self.channel_id)
            .field("agent_id", &self.agent_id)
            .field("auto_reply", &self.auto_reply())
            .field("auto_reply_window", &self.auto_reply_window())
            .finish()
    }
}

impl Session {
    pub fn new(
        channel_id: impl Into<String>,
        agent_id: impl Into<String>,
        auto_reply_window: usize,
        core: Arc<ChatCore>,
    ) -> Self {
        let session = Self {
            channel_id: channel_id.into(),
            agent_id: agent_id.into(),
            auto_reply: AtomicBool::new(false),
            auto_reply_window: AtomicUsize::new(auto_reply_window),
            core,
        };
        info!(
            channel_id = %session.channel_id,
            agent_id = %session.agent_id,
            "session initialised"
        );
        session
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    // ── Settings ──────────────────────────────────────────────────────────

    pub fn auto_reply(&self) -> bool {
        self.auto_reply.load(Ordering::Relaxed)
    }

    pub fn set_auto_reply(&self, enabled: bool) {
        self.auto_reply.store(enabled, Ordering::Relaxed);
    }

    /// Flip `auto_reply` and return the new value.
    pub fn toggle_auto_reply(&self) -> bool {
        !self.auto_reply.fetch_xor(true, Ordering::Relaxed)
    }

    /// Stored and reported, but not applied to any history window.
    pub fn auto_reply_window(&self) -> usize {
        self.auto_reply_window.load(Ordering::Relaxed)
    }

    pub fn set_auto_reply_window(&self, length: usize) {
        self.auto_reply_window.store(length, Ordering::Relaxed);
    }

    // ── Formatting ────────────────────────────────────────────────────────

    /// Map `messages` (oldest first) to turns, one per message, same order.
    ///
    /// The agent's own messages become `assistant` turns with the raw text;
    /// everyone else's become `user` turns prefixed with the display name so
    /// several humans can share the single user role.
    pub fn prepare(&self, messages: &[ChatMessage]) -> Vec<Turn> {
        debug!(channel_id = %self.channel_id, messages = messages.len(), "prepare messages");
        messages
            .iter()
            .map(|m| {
                if m.author_id == self.agent_id {
                    Turn::assistant(m.content.clone())
                } else {
                    Turn::user(format!("{}: {}", m.display_name, m.content))
                }
            })
            .collect()
    }

    // ── Operations ────────────────────────────────────────────────────────

    /// Answer a standalone question. Channel history is never consulted.
    pub async fn ask(&self, question: &str) -> Result<String, ChatError> {
        info!(channel_id = %self.channel_id, question, "ask");
        self.core.complete(Operation::Ask, ask_turns(question)).await
    }

    /// Continue the conversation in `messages`. `Ok(None)` means the model
    /// chose to say nothing; callers must not send anything in that case.
    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<Option<String>, ChatError> {
        info!(channel_id = %self.channel_id, messages = messages.len(), "chat");
        let text = self.core.complete(Operation::Chat, self.prepare(messages)).await?;
        Ok(interpret_reply(text))
    }

    /// Summarise `messages`. The raw completion text is returned as is.
    pub async fn summarize(&self, messages: &[ChatMessage]) -> Result<String, ChatError> {
        info!(channel_id = %self.channel_id, messages = messages.len(), "summary");
        self.core.complete(Operation::Summary, self.prepare(messages)).await
    }
}

/// The turn list for `ask`: a single user turn holding the raw question.
pub fn ask_turns(question: &str) -> Vec<Turn> {
    vec![Turn::user(question)]
}

/// `None` iff `text` is exactly the sentinel.
fn interpret_reply(text: String) -> Option<String> {
    if text == END_SENTINEL { None } else { Some(text) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;
    use crate::llm::providers::dummy::DummyProvider;
    use crate::subsystems::chat::testing;

    const BOT: &str = "100";

    fn session(dummy: &DummyProvider) -> Session {
        Session::new("chan-1", BOT, 10, testing::core(dummy))
    }

    #[test]
    fn prepare_tags_roles_and_prefixes_names() {
        let s = session(&DummyProvider::new());
        let turns = s.prepare(&[
            ChatMessage::new(BOT, "Parley", "hi"),
            ChatMessage::new("200", "Alice", "hey"),
        ]);
        assert_eq!(turns, vec![Turn::assistant("hi"), Turn::user("Alice: hey")]);
    }

    #[test]
    fn prepare_preserves_length_and_order() {
        let s = session(&DummyProvider::new());
        let messages: Vec<ChatMessage> = (0..25)
            .map(|i| {
                let author = if i % 3 == 0 { BOT.to_string() } else { format!("user{}", i % 2) };
                ChatMessage::new(author, format!("name{i}"), format!("msg {i}"))
            })
            .collect();

        let turns = s.prepare(&messages);
        assert_eq!(turns.len(), messages.len());
        for (m, t) in messages.iter().zip(&turns) {
            if m.author_id == BOT {
                assert_eq!(t.role, Role::Assistant);
                assert_eq!(t.content, m.content);
            } else {
                assert_eq!(t.role, Role::User);
                assert_eq!(t.content, format!("{}: {}", m.display_name, m.content));
            }
        }
    }

    #[test]
    fn prepare_keeps_duplicates() {
        let s = session(&DummyProvider::new());
        let m = ChatMessage::new("200", "Alice", "same");
        assert_eq!(s.prepare(&[m.clone(), m]).len(), 2);
    }

    #[test]
    fn prepare_empty_is_empty() {
        assert!(session(&DummyProvider::new()).prepare(&[]).is_empty());
    }

    #[test]
    fn agent_display_name_is_never_prefixed() {
        let s = session(&DummyProvider::new());
        let turns = s.prepare(&[ChatMessage::new(BOT, "Parley", "Parley: odd but raw")]);
        assert_eq!(turns[0].content, "Parley: odd but raw");
    }

    #[tokio::test]
    async fn chat_returns_none_on_sentinel() {
        let dummy = DummyProvider::with_reply("<END>");
        let reply = session(&dummy).chat(&[ChatMessage::new("200", "Alice", "hey")]).await.unwrap();
        assert_eq!(reply, None);
    }

    #[tokio::test]
    async fn chat_returns_empty_string_verbatim() {
        let dummy = DummyProvider::with_reply("");
        let reply = session(&dummy).chat(&[]).await.unwrap();
        assert_eq!(reply, Some(String::new()));
    }

    #[tokio::test]
    async fn chat_only_exact_sentinel_is_silence() {
        for text in ["<END> ", "<end>", "bye <END>", "END"] {
            let dummy = DummyProvider::with_reply(text);
            let reply = session(&dummy).chat(&[]).await.unwrap();
            assert_eq!(reply.as_deref(), Some(text));
        }
    }

    #[tokio::test]
    async fn chat_sends_chat_prompt_model_and_turns() {
        let dummy = DummyProvider::with_reply("ok");
        session(&dummy)
            .chat(&[ChatMessage::new(BOT, "Parley", "hi"), ChatMessage::new("200", "Alice", "hey")])
            .await
            .unwrap();

        let seen = dummy.requests();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].model, "chat-model");
        assert_eq!(seen[0].system, "chat prompt");
        assert_eq!(seen[0].turns, vec![Turn::assistant("hi"), Turn::user("Alice: hey")]);
    }

    #[tokio::test]
    async fn summarize_does_not_interpret_sentinel() {
        let dummy = DummyProvider::with_reply("<END>");
        let summary = session(&dummy).summarize(&[]).await.unwrap();
        assert_eq!(summary, "<END>");

        let seen = dummy.requests();
        assert_eq!(seen[0].model, "summary-model");
        assert_eq!(seen[0].system, "summary prompt");
        assert!(seen[0].turns.is_empty());
    }

    #[tokio::test]
    async fn ask_uses_only_the_question() {
        let dummy = DummyProvider::new();
        let s = session(&dummy);
        let answer = s.ask("what is rust?").await.unwrap();
        assert_eq!(answer, "[echo] what is rust?");

        let seen = dummy.requests();
        assert_eq!(seen[0].model, "ask-model");
        assert_eq!(seen[0].system, "ask prompt");
        assert_eq!(seen[0].turns, ask_turns("what is rust?"));
        assert_eq!(ask_turns("q"), vec![Turn::user("q")]);
    }

    #[tokio::test]
    async fn operations_require_credential() {
        let dummy = DummyProvider::with_reply("x");
        let core = std::sync::Arc::new(ChatCore::new(
            crate::llm::LlmProvider::Dummy(dummy.clone()),
            testing::prompts(),
            testing::models(),
            false,
        ));
        let s = Session::new("c", BOT, 10, core);

        assert!(matches!(s.ask("q").await, Err(ChatError::MissingApiKey)));
        assert!(matches!(s.chat(&[]).await, Err(ChatError::MissingApiKey)));
        assert!(matches!(s.summarize(&[]).await, Err(ChatError::MissingApiKey)));
        assert!(dummy.requests().is_empty());
    }

    #[test]
    fn auto_reply_settings() {
        let s = session(&DummyProvider::new());
        assert!(!s.auto_reply());
        assert_eq!(s.auto_reply_window(), 10);

        assert!(s.toggle_auto_reply());
        assert!(s.auto_reply());
        assert!(!s.toggle_auto_reply());

        s.set_auto_reply(true);
        assert!(s.auto_reply());
        s.set_auto_reply_window(25);
        assert_eq!(s.auto_reply_window(), 25);
    }
}
