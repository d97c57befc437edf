//! Channel-id → [`Session`] registry.
//!
//! One registry is built at startup and handed to every channel as an
//! `Arc<SessionRegistry>`. Lookup-or-create happens under a single lock, so
//! two first touches of the same channel always observe the same session.
//! Sessions are never evicted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use super::{ChatCore, Session};

pub struct SessionRegistry {
    core: Arc<ChatCore>,
    default_auto_reply_window: usize,
    sessions: Mutex<HashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new(core: Arc<ChatCore>, default_auto_reply_window: usize) -> Self {
        Self {
            core,
            default_auto_reply_window,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Return the session for `channel_id`, creating it (auto-reply off) on
    /// first use. `agent_id` only matters for that first creation.
    pub fn get_or_create(&self, channel_id: &str, agent_id: &str) -> Arc<Session> {
        let mut sessions = self.lock();
        if let Some(existing) = sessions.get(channel_id) {
            return existing.clone();
        }
        debug!(%channel_id, total = sessions.len() + 1, "creating session");
        let session = Arc::new(Session::new(
            channel_id,
            agent_id,
            self.default_auto_reply_window,
            self.core.clone(),
        ));
        sessions.insert(channel_id.to_string(), session.clone());
        session
    }

    /// Existing session for `channel_id`, if any.
    pub fn get(&self, channel_id: &str) -> Option<Arc<Session>> {
        self.lock().get(channel_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // Poisoning is ignored: every mutation is a single insert.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<Session>>> {
        self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
