//! Discord comms channel: gateway in, REST out.
//!
//! ```text
//! Gateway ── MESSAGE_CREATE ──▶ Handler::on_message (one task per message)
//!                                   │ commands / auto-reply
//!                                   ▼
//!                        CommsState::session ─▶ Session ─▶ ChatCore
//!                                   │
//!                                   ▼
//!                              DiscordRest (send / embed / purge)
//! ```
//!
//! The gateway session is re-established after a fixed delay whenever
//! Discord ends it. Only an unusable token (the initial `GET /gateway/bot`
//! failing) is fatal.

pub mod commands;
pub mod format;
pub mod gateway;
pub mod handler;
pub mod model;
pub mod rest;

use std::env;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::AppError;
use crate::subsystems::runtime::{Component, ComponentFuture};
use super::state::{CommsEvent, CommsState};
use gateway::{Gateway, GatewayEvent};
use handler::{Handler, HandlerSettings};
use rest::DiscordRest;

/// Pause between gateway sessions.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum DiscordError {
    #[error("discord http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("discord API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("discord gateway error: {0}")]
    Gateway(String),
    #[error("discord websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("discord payload error: {0}")]
    Json(#[from] serde_json::Error),
}

// ── DiscordChannel ────────────────────────────────────────────────────────────

pub struct DiscordChannel {
    component_id: String,
    state: Arc<CommsState>,
    settings: HandlerSettings,
    owner_ids: Vec<String>,
}

impl DiscordChannel {
    pub fn new(component_id: impl Into<String>, state: Arc<CommsState>, config: &Config) -> Self {
        Self {
            component_id: component_id.into(),
            state,
            settings: HandlerSettings::from_config(config),
            owner_ids: config.comms.discord.owner_ids.clone(),
        }
    }
}

impl Component for DiscordChannel {
    fn id(&self) -> &str {
        &self.component_id
    }

    fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture {
        Box::pin(run_discord(*self, shutdown))
    }
}

// ── run_discord ───────────────────────────────────────────────────────────────

async fn run_discord(channel: DiscordChannel, shutdown: CancellationToken) -> Result<(), AppError> {
    let DiscordChannel { component_id, state, settings, owner_ids } = channel;

    let token = match env::var("DISCORD_TOKEN") {
        Ok(t) if !t.trim().is_empty() => t,
        _ => {
            warn!(%component_id, "DISCORD_TOKEN not set, discord channel exiting");
            return Ok(());
        }
    };

    info!(%component_id, "discord channel starting");

    let rest = DiscordRest::new(token.clone()).map_err(comms_error)?;
    let gateway_url = rest.gateway_url().await.map_err(comms_error)?;
    let owner_ids = resolve_owners(&rest, owner_ids).await;

    loop {
        let outcome = tokio::select! {
            _ = shutdown.cancelled() => None,
            result = run_session(&component_id, &gateway_url, &token, &rest, &state, &settings, &owner_ids) => Some(result),
        };

        match outcome {
            None => break,
            Some(Ok(())) => info!(%component_id, "gateway session ended, reconnecting"),
            Some(Err(e)) => error!(%component_id, "gateway session failed: {e}"),
        }

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
        }
    }

    info!(%component_id, "discord channel shutting down");
    state.report_event(CommsEvent::ChannelShutdown { component: component_id });
    Ok(())
}

/// One identified gateway session; returns when Discord ends it.
async fn run_session(
    component_id: &str,
    gateway_url: &str,
    token: &str,
    rest: &DiscordRest,
    state: &Arc<CommsState>,
    settings: &HandlerSettings,
    owner_ids: &[String],
) -> Result<(), DiscordError> {
    let mut gateway = Gateway::connect(gateway_url, token).await?;
    let mut handler: Option<Arc<Handler>> = None;

    while let Some(event) = gateway.next_event().await? {
        match event {
            GatewayEvent::Ready(ready) => {
                info!(%component_id, agent_id = %ready.user.id, user = %ready.user.username, "discord ready");
                state.report_event(CommsEvent::Connected {
                    component: component_id.to_string(),
                    agent_id: ready.user.id.clone(),
                });
                handler = Some(Arc::new(Handler::new(
                    rest.clone(),
                    state.clone(),
                    settings.clone(),
                    ready.user.id,
                    owner_ids.to_vec(),
                )));
            }
            GatewayEvent::MessageCreate(message) => {
                let Some(handler) = handler.clone() else {
                    debug!(%component_id, "message before READY, ignoring");
                    continue;
                };
                if message.author.id == handler.agent_id() {
                    continue;
                }
                tokio::spawn(async move { handler.on_message(&message).await });
            }
        }
    }

    gateway.close().await;
    Ok(())
}

/// Configured owners, or the application owner when none are configured.
async fn resolve_owners(rest: &DiscordRest, configured: Vec<String>) -> Vec<String> {
    if !configured.is_empty() {
        return configured;
    }
    match rest.application_owner().await {
        Ok(Some(owner)) => {
            debug!(%owner, "using application owner for owner-only commands");
            vec![owner]
        }
        Ok(None) => {
            warn!("application has no owner; owner-only commands are disabled");
            Vec::new()
        }
        Err(e) => {
            warn!("could not look up application owner: {e}");
            Vec::new()
        }
    }
}

fn comms_error(e: DiscordError) -> AppError {
    AppError::Comms(e.to_string())
}
