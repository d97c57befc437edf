//! Shared state for the Comms subsystem: capability boundary for channels.
//!
//! Channels receive an `Arc<CommsState>` and reach chat sessions only
//! through [`CommsState::session`]. The registry itself stays private.
//!
//! # Intra-subsystem events
//!
//! [`CommsState::report_event`] lets a running channel signal the comms
//! subsystem manager ("connected", "shut down"). The manager owns the
//! receiver end.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::warn;

use crate::subsystems::chat::{Session, SessionRegistry};

// ── Events ────────────────────────────────────────────────────────────────────

/// Events a channel sends back to the comms subsystem manager.
#[derive(Debug)]
pub enum CommsEvent {
    /// The channel is connected and knows its own user id.
    Connected { component: String, agent_id: String },
    /// Channel has stopped.
    ChannelShutdown { component: String },
}

// ── State ─────────────────────────────────────────────────────────────────────

/// Shared state passed as `Arc<CommsState>` to every channel task.
pub struct CommsState {
    registry: Arc<SessionRegistry>,
    event_tx: mpsc::Sender<CommsEvent>,
}

impl CommsState {
    pub fn new(registry: Arc<SessionRegistry>, event_tx: mpsc::Sender<CommsEvent>) -> Self {
        Self { registry, event_tx }
    }

    /// Session bound to `channel_id`, created on first use.
    pub fn session(&self, channel_id: &str, agent_id: &str) -> Arc<Session> {
        self.registry.get_or_create(channel_id, agent_id)
    }

    /// Report an event to the comms subsystem manager.
    ///
    /// Non-blocking: drops the event and logs a warning if the manager is not
    /// keeping up (channel full) or has already exited (closed).
    pub fn report_event(&self, event: CommsEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            warn!("comms event dropped: {e}");
        }
    }
}
