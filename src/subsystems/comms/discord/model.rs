//! Discord wire types: the subset of fields this bot reads.

use serde::Deserialize;

use crate::subsystems::chat::ChatMessage;

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub global_name: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub id: String,
    pub channel_id: String,
    #[serde(default)]
    pub guild_id: Option<String>,
    pub author: User,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub mentions: Vec<User>,
}

impl Message {
    /// Global display name, then username. Server nicknames are ignored:
    /// REST history carries no member data, and an author must be named the
    /// same in history as in the live message.
    pub fn display_name(&self) -> &str {
        self.author.global_name.as_deref().unwrap_or(&self.author.username)
    }

    pub fn mentions_user(&self, user_id: &str) -> bool {
        self.mentions.iter().any(|u| u.id == user_id)
    }

    pub fn to_chat_message(&self) -> ChatMessage {
        ChatMessage::new(self.author.id.clone(), self.display_name(), self.content.clone())
    }
}

/// `READY` dispatch payload.
#[derive(Debug, Clone, Deserialize)]
pub struct Ready {
    pub user: User,
    #[serde(default)]
    pub session_id: String,
}

/// Envelope of every gateway frame.
#[derive(Debug, Deserialize)]
pub struct GatewayPayload {
    pub op: u8,
    #[serde(default)]
    pub d: serde_json::Value,
    #[serde(default)]
    pub s: Option<u64>,
    #[serde(default)]
    pub t: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct GatewayBot {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct Application {
    #[serde(default)]
    pub owner: Option<User>,
}
