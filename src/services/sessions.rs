use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::models::ConversationState;

pub type SessionHandle = Arc<tokio::sync::Mutex<ConversationState>>;

/// Per-session conversation state. Each session sits behind its own async
/// mutex, held for a whole turn, so events for one session run one at a time.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<Uuid, SessionHandle>>,
    ttl: Duration,
}

impl SessionRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn insert(&self, state: ConversationState) -> anyhow::Result<(Uuid, SessionHandle)> {
        let id = Uuid::new_v4();
        let handle = Arc::new(tokio::sync::Mutex::new(state));
        let mut sessions = self.lock()?;
        self.evict_expired(&mut sessions);
        sessions.insert(id, Arc::clone(&handle));
        Ok((id, handle))
    }

    pub fn get(&self, id: Uuid) -> anyhow::Result<Option<SessionHandle>> {
        let mut sessions = self.lock()?;
        self.evict_expired(&mut sessions);
        Ok(sessions.get(&id).cloned())
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> anyhow::Result<std::sync::MutexGuard<'_, HashMap<Uuid, SessionHandle>>> {
        self.sessions
            .lock()
            .map_err(|_| anyhow::anyhow!("session registry lock poisoned"))
    }

    /// Drops idle sessions. A session busy with a turn is never evicted.
    fn evict_expired(&self, sessions: &mut HashMap<Uuid, SessionHandle>) {
        let cutoff = Utc::now().naive_utc() - self.ttl;
        let before = sessions.len();
        sessions.retain(|_, handle| match handle.try_lock() {
            Ok(state) => state.last_activity > cutoff,
            Err(_) => true,
        });
        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::info!(evicted, "expired idle sessions");
        }
    }
}
