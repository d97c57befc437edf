//! Per-message routing: prefix commands and auto-replies.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::DiscordError;
use super::commands::{self, Command, ParseError};
use super::format;
use super::model::Message;
use super::rest::DiscordRest;
use crate::config::Config;
use crate::subsystems::chat::{ChatError, ChatMessage, Session};
use crate::subsystems::comms::state::CommsState;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("Only the bot owner can use this command.")]
    NotOwner,
    #[error(transparent)]
    Chat(#[from] ChatError),
    #[error(transparent)]
    Discord(#[from] DiscordError),
}

/// Knobs the handler reads from [`Config`].
#[derive(Debug, Clone)]
pub struct HandlerSettings {
    pub prefix: String,
    pub auto_reply_history: usize,
    pub chat_window: usize,
    pub summary_window: usize,
}

impl HandlerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            prefix: config.comms.discord.command_prefix.clone(),
            auto_reply_history: config.comms.discord.auto_reply_history,
            chat_window: config.chat.chat_window,
            summary_window: config.chat.summary_window,
        }
    }
}

/// Built once per gateway session, after `READY` tells us who we are.
pub struct Handler {
    rest: DiscordRest,
    state: Arc<CommsState>,
    settings: HandlerSettings,
    agent_id: String,
    owner_ids: Vec<String>,
}

impl Handler {
    pub fn new(
        rest: DiscordRest,
        state: Arc<CommsState>,
        settings: HandlerSettings,
        agent_id: impl Into<String>,
        owner_ids: Vec<String>,
    ) -> Self {
        Self { rest, state, settings, agent_id: agent_id.into(), owner_ids }
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Entry point for every `MESSAGE_CREATE`. Never fails; errors are
    /// logged and, for commands, reported back to the channel.
    pub async fn on_message(&self, message: &Message) {
        if message.author.bot {
            return;
        }

        if let Some(parsed) = commands::parse(&self.settings.prefix, &message.content) {
            self.on_command(message, parsed).await;
            return;
        }

        let session = self.session(message);
        if !session.auto_reply() && !message.mentions_user(&self.agent_id) {
            return;
        }

        debug!(channel_id = %message.channel_id, auto_reply = session.auto_reply(), "auto-reply triggered");
        if let Err(e) = self.auto_reply(&session, message).await {
            error!(channel_id = %message.channel_id, "auto-reply failed: {e}");
        }
    }

    async fn auto_reply(&self, session: &Session, message: &Message) -> Result<(), CommandError> {
        self.typing(&message.channel_id).await;
        let mut history = self.history_before(message, self.settings.auto_reply_history).await?;
        history.push(message.to_chat_message());
        if let Some(reply) = session.chat(&history).await? {
            self.rest.send_message(&message.channel_id, &reply).await?;
        }
        Ok(())
    }

    async fn on_command(&self, message: &Message, parsed: Result<Command, ParseError>) {
        let result = match parsed {
            Err(ParseError::Unknown(name)) => {
                debug!(channel_id = %message.channel_id, command = %name, "ignoring unknown command");
                return;
            }
            Err(e) => Err(CommandError::from(e)),
            Ok(command) => {
                info!(
                    channel_id = %message.channel_id,
                    author = %message.author.id,
                    command = command.name(),
                    "command received"
                );
                self.run_command(message, command).await
            }
        };

        if let Err(e) = result {
            error!(channel_id = %message.channel_id, "command failed: {e}");
            let embed = format::error_embed(&e.to_string());
            if let Err(send_err) = self.rest.send_embed(&message.channel_id, &embed).await {
                error!(channel_id = %message.channel_id, "could not report command error: {send_err}");
            }
        }
    }

    async fn run_command(&self, message: &Message, command: Command) -> Result<(), CommandError> {
        let channel_id = message.channel_id.as_str();
        let session = self.session(message);

        match command {
            Command::Chat { message: text, window } => {
                self.typing(channel_id).await;
                let window = window.unwrap_or(self.settings.chat_window);
                let mut history = self.history_before(message, window).await?;
                history.push(ChatMessage::new(message.author.id.clone(), message.display_name(), text));
                if let Some(reply) = session.chat(&history).await? {
                    self.rest.send_message(channel_id, &reply).await?;
                }
            }
            Command::Ask { question } => {
                self.typing(channel_id).await;
                let answer = session.ask(&question).await?;
                self.rest.send_embed(channel_id, &format::field_embed("Answer", &answer)).await?;
            }
            Command::Summary { window } => {
                self.typing(channel_id).await;
                let window = window.unwrap_or(self.settings.summary_window);
                let history = self.history_before(message, window).await?;
                let summary = session.summarize(&history).await?;
                self.rest.send_embed(channel_id, &format::field_embed("Summary", &summary)).await?;
            }
            Command::AutoReply { enabled } => {
                let now = match enabled {
                    Some(value) => {
                        session.set_auto_reply(value);
                        value
                    }
                    None => session.toggle_auto_reply(),
                };
                info!(%channel_id, auto_reply = now, "auto-reply updated");
                let state = if now { "enabled" } else { "disabled" };
                self.rest.send_message(channel_id, &format!("Auto-reply is now {state}")).await?;
            }
            Command::AutoReplyWindow { length } => {
                if let Some(length) = length {
                    session.set_auto_reply_window(length);
                }
                let length = session.auto_reply_window();
                self.rest
                    .send_message(channel_id, &format!("Auto-reply window is now {length}"))
                    .await?;
            }
            Command::Purge { limit } => {
                if !self.owner_ids.iter().any(|id| *id == message.author.id) {
                    return Err(CommandError::NotOwner);
                }
                let ids: Vec<String> =
                    self.rest.recent(channel_id, limit).await?.into_iter().map(|m| m.id).collect();
                self.rest.delete_messages(channel_id, &ids).await?;
                info!(%channel_id, deleted = ids.len(), "purged messages");
                self.rest
                    .send_message(channel_id, &format!("Deleted {} messages", ids.len()))
                    .await?;
            }
        }
        Ok(())
    }

    fn session(&self, message: &Message) -> Arc<Session> {
        self.state.session(&message.channel_id, &self.agent_id)
    }

    /// Up to `limit` messages before `message`, oldest first.
    async fn history_before(
        &self,
        message: &Message,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, DiscordError> {
        let history = self.rest.history(&message.channel_id, &message.id, limit).await?;
        Ok(history.iter().map(Message::to_chat_message).collect())
    }

    // Typing failures are logged, never propagated.
    async fn typing(&self, channel_id: &str) {
        if let Err(e) = self.rest.trigger_typing(channel_id).await {
            warn!(%channel_id, "trigger typing failed: {e}");
        }
    }
}
