//! In-memory session table

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use presence_domain::SessionId;
use tokio::sync::Mutex as AsyncMutex;

use crate::PresenceSession;

/// A session shared between requests; its lock serializes work on it
pub type SharedSession = Arc<AsyncMutex<PresenceSession>>;

/// Live sessions keyed by id
#[derive(Default)]
pub struct SessionTable {
    sessions: Mutex<HashMap<SessionId, SharedSession>>,
}

impl SessionTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<SessionId, SharedSession>> {
        // Entries are only inserted or removed whole, so a poisoned map is still consistent
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add a session and return its shared handle
    pub fn insert(&self, session: PresenceSession) -> SharedSession {
        let id = session.id();
        let shared = Arc::new(AsyncMutex::new(session));
        self.entries().insert(id, Arc::clone(&shared));
        shared
    }

    /// Look up a session
    pub fn get(&self, id: SessionId) -> Option<SharedSession> {
        self.entries().get(&id).cloned()
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// True when no sessions are live
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop sessions whose `stale_after(retention)` is before `now`
    ///
    /// Sessions currently locked by a request are kept for the next sweep.
    /// Returns the number removed.
    pub fn sweep(&self, now: DateTime<Utc>, retention: Duration) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, session| match session.try_lock() {
            Ok(session) => session.stale_after(retention) >= now,
            Err(_) => true,
        });
        before - entries.len()
    }
}
