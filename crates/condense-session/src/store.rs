//! In-memory session registry.
//!
//! Each session sits behind its own async mutex, which is the exclusion scope
//! for one request pipeline. The registry map itself is only locked for
//! lookups, inserts and removals and never across an await.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, info};

use condense_core::{Error, Result, Session, SessionId, SessionSummary};

/// Shared handle to a live session. Lock it to read or mutate.
pub type SessionHandle = Arc<Mutex<Session>>;

/// Registry of live sessions keyed by ID.
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,
    compression_default: bool,
}

impl SessionStore {
    /// Create an empty store; new sessions start with compression enabled.
    pub fn new() -> Self {
        Self::with_compression_default(true)
    }

    /// Create an empty store with the given compression flag for new sessions.
    pub fn with_compression_default(enabled: bool) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            compression_default: enabled,
        }
    }

    /// Register a fresh session and return its ID.
    pub fn create(&self) -> SessionId {
        let mut sessions = self.sessions.write();

        let mut session = Session::new();
        while sessions.contains_key(&session.id) {
            session = Session::new();
        }
        session.compression_enabled = self.compression_default;

        let id = session.id.clone();
        sessions.insert(id.clone(), Arc::new(Mutex::new(session)));
        debug!(session = %id, "Created session");
        id
    }

    /// Look up a session handle.
    pub fn get(&self, id: &str) -> Result<SessionHandle> {
        self.sessions
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))
    }

    /// Remove a session. Returns whether it existed.
    ///
    /// A request already holding the handle finishes against the detached
    /// session.
    pub fn delete(&self, id: &str) -> bool {
        let removed = self.sessions.write().remove(id).is_some();
        if removed {
            debug!(session = %id, "Deleted session");
        }
        removed
    }

    /// IDs starting with `prefix`, sorted.
    pub fn find_by_prefix(&self, prefix: &str) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self
            .sessions
            .read()
            .keys()
            .filter(|id| id.starts_with(prefix))
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    /// Snapshot of every session's public fields, most recently active first.
    pub async fn list(&self) -> Vec<SessionSummary> {
        let handles: Vec<SessionHandle> = self.sessions.read().values().cloned().collect();

        let mut summaries = join_all(
            handles
                .iter()
                .map(|handle| async move { handle.lock().await.summary() }),
        )
        .await;

        summaries.sort_by(|a, b| b.last_activity_at.cmp(&a.last_activity_at));
        summaries
    }

    /// Remove every session idle since before `now - ttl`.
    ///
    /// Sessions whose lock is currently held are mid-request and therefore
    /// not idle; they are skipped without waiting. A candidate is removed
    /// while its lock is held and only if the registry still maps its ID to
    /// the same handle.
    pub fn sweep(&self, now: DateTime<Utc>, ttl: Duration) -> usize {
        let Some(cutoff) = now.checked_sub_signed(ttl) else {
            return 0;
        };

        let candidates: Vec<(SessionId, SessionHandle)> = self
            .sessions
            .read()
            .iter()
            .map(|(id, handle)| (id.clone(), Arc::clone(handle)))
            .collect();

        let mut removed = 0;
        for (id, handle) in candidates {
            let Ok(session) = handle.try_lock() else {
                debug!(session = %id, "Skipping busy session during sweep");
                continue;
            };

            if session.last_activity_at >= cutoff {
                continue;
            }

            let mut sessions = self.sessions.write();
            if sessions
                .get(&id)
                .is_some_and(|current| Arc::ptr_eq(current, &handle))
            {
                sessions.remove(&id);
                removed += 1;
                debug!(session = %id, last_activity = %session.last_activity_at, "Evicted idle session");
            }
        }

        if removed > 0 {
            info!(removed, "Swept idle sessions");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
