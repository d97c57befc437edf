//! Comms subsystem: manages the external chat channels.
//!
//! # Architecture
//!
//! Each channel implements [`runtime::Component`] and is spawned as an
//! independent task by [`start`] via [`runtime::spawn_components`]. Channels
//! capture their shared [`Arc<CommsState>`] at construction time, so no
//! state is passed through the generic `Component::run` signature.
//!
//! An intra-subsystem [`mpsc`] channel lets running channels signal the
//! comms manager (lifecycle events). It is drained by a short-lived
//! background task that ends when all channel senders are dropped.
//!
//! [`runtime::Component`]: crate::subsystems::runtime::Component
//! [`runtime::spawn_components`]: crate::subsystems::runtime::spawn_components

mod state;
#[cfg(feature = "channel-discord")]
pub mod discord;

pub use state::{CommsEvent, CommsState};

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::Config;
use crate::subsystems::chat::SessionRegistry;
use crate::subsystems::runtime::{Component, SubsystemHandle, spawn_components};

// ── start ───────────────────────────────────────────────────────────────────

/// Spawn all configured comms channels and return a [`SubsystemHandle`].
///
/// Channels start immediately. If any channel exits with an error the shared
/// `shutdown` token is cancelled so siblings stop cooperatively. The handle
/// resolves when all channels have exited.
pub fn start(
    config: &Config,
    registry: Arc<SessionRegistry>,
    shutdown: CancellationToken,
) -> SubsystemHandle {
    let (event_tx, event_rx) = mpsc::channel::<CommsEvent>(32);
    let state = Arc::new(CommsState::new(registry, event_tx));

    let mut components: Vec<Box<dyn Component>> = Vec::new();

    #[cfg(feature = "channel-discord")]
    {
        if config.comms_discord_should_load() {
            info!("loading discord channel");
            components.push(Box::new(discord::DiscordChannel::new("discord0", state.clone(), config)));
        }
    }
    #[cfg(not(feature = "channel-discord"))]
    let _ = config;

    if components.is_empty() {
        info!("no comms channels configured");
    }

    // The manager's own handle must go, or the drain below never ends.
    drop(state);

    tokio::spawn(async move {
        let mut rx = event_rx;
        while let Some(event) = rx.recv().await {
            match event {
                CommsEvent::Connected { ref component, ref agent_id } => {
                    info!(component, agent_id, "channel connected");
                }
                CommsEvent::ChannelShutdown { ref component } => {
                    debug!(component, "channel reported shutdown");
                }
            }
        }
    });

    spawn_components(components, shutdown)
}
