//! Session behaviour through the public API, backed by the dummy provider.

use std::sync::Arc;

use parley_bot::config::ModelConfig;
use parley_bot::llm::providers::dummy::DummyProvider;
use parley_bot::llm::{LlmProvider, Role};
use parley_bot::subsystems::chat::{ChatCore, ChatError, ChatMessage, PromptSet, SessionRegistry};

fn registry(dummy: &DummyProvider, credential: bool) -> SessionRegistry {
    let prompts = PromptSet {
        chat: "chat prompt".into(),
        ask: "ask prompt".into(),
        summary: "summary prompt".into(),
    };
    let models = ModelConfig { chat: "m-chat".into(), ask: "m-ask".into(), summary: "m-summary".into() };
    let core = ChatCore::new(LlmProvider::Dummy(dummy.clone()), prompts, models, credential);
    SessionRegistry::new(Arc::new(core), 10)
}

fn conversation() -> Vec<ChatMessage> {
    vec![
        ChatMessage::new("u1", "Alice", "hi"),
        ChatMessage::new("bot", "parley", "hello!"),
        ChatMessage::new("u2", "Bob", "what's up"),
    ]
}

#[tokio::test]
async fn test_chat_round_trip() {
    let dummy = DummyProvider::with_reply("not much");
    let reg = registry(&dummy, true);
    let session = reg.get_or_create("c1", "bot");

    let reply = session.chat(&conversation()).await.unwrap();
    assert_eq!(reply.as_deref(), Some("not much"));

    let request = &dummy.requests()[0];
    assert_eq!(request.model, "m-chat");
    assert_eq!(request.system, "chat prompt");
    let roles: Vec<Role> = request.turns.iter().map(|t| t.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
    assert_eq!(request.turns[2].content, "Bob: what's up");
}

#[tokio::test]
async fn test_sentinel_means_silence() {
    let dummy = DummyProvider::with_reply("<END>");
    let reg = registry(&dummy, true);
    let reply = reg.get_or_create("c1", "bot").chat(&conversation()).await.unwrap();
    assert!(reply.is_none());
}

#[tokio::test]
async fn test_summary_passes_sentinel_through() {
    let dummy = DummyProvider::with_reply("<END>");
    let reg = registry(&dummy, true);
    let summary = reg.get_or_create("c1", "bot").summarize(&conversation()).await.unwrap();
    assert_eq!(summary, "<END>");
    assert_eq!(dummy.requests()[0].model, "m-summary");
}

#[tokio::test]
async fn test_missing_credential_makes_no_call() {
    let dummy = DummyProvider::with_reply("x");
    let reg = registry(&dummy, false);
    let session = reg.get_or_create("c1", "bot");

    assert!(matches!(session.ask("why?").await, Err(ChatError::MissingApiKey)));
    assert!(matches!(session.chat(&conversation()).await, Err(ChatError::MissingApiKey)));
    assert!(matches!(session.summarize(&conversation()).await, Err(ChatError::MissingApiKey)));
    assert!(dummy.requests().is_empty());
}

#[tokio::test]
async fn test_settings_persist_across_lookups() {
    let dummy = DummyProvider::new();
    let reg = registry(&dummy, true);
    assert!(reg.get_or_create("c1", "bot").toggle_auto_reply());
    assert!(reg.get_or_create("c1", "bot").auto_reply());
    assert!(!reg.get_or_create("c2", "bot").auto_reply());
}
