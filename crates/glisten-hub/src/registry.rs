//! Attached session registry

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use glisten_core::{HubError, SessionId};

use crate::sink::Sink;

/// An attached session: its display label and write capability
#[derive(Clone)]
pub struct SessionEntry {
    /// Session ID
    pub id: SessionId,
    /// Human-readable label (usually the login name)
    pub label: String,
    /// Outbound write capability
    pub sink: Arc<dyn Sink>,
}

impl std::fmt::Debug for SessionEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionEntry")
            .field("id", &self.id)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Tracks every currently attached sink
///
/// Fanout never iterates the map directly. It works on a [`snapshot`],
/// so a detach racing with a broadcast only affects later broadcasts.
///
/// [`snapshot`]: SessionRegistry::snapshot
pub struct SessionRegistry {
    /// Sessions indexed by session ID
    sessions: DashMap<SessionId, SessionEntry>,
    /// Next session ID to allocate
    next_id: AtomicU64,
    /// Maximum number of attached sessions
    max_sessions: Option<usize>,
}

impl SessionRegistry {
    /// Create an empty registry with no session limit
    pub fn new() -> Self {
        Self::with_limit(None)
    }

    /// Create an empty registry that rejects attaches beyond `max_sessions`
    pub fn with_limit(max_sessions: Option<usize>) -> Self {
        Self {
            sessions: DashMap::new(),
            next_id: AtomicU64::new(1),
            max_sessions,
        }
    }

    /// Register a sink under a fresh session ID
    ///
    /// The session limit check and the insert are separate steps. Callers
    /// must serialize attaches; [`BroadcastHub`](crate::BroadcastHub) does
    /// so under its publish lock.
    pub(crate) fn attach(
        &self,
        label: impl Into<String>,
        sink: Arc<dyn Sink>,
    ) -> Result<SessionId, HubError> {
        if let Some(max) = self.max_sessions {
            let attached = self.sessions.len();
            if attached >= max {
                return Err(HubError::SessionLimitExceeded(attached));
            }
        }

        let id = SessionId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.sessions.insert(
            id,
            SessionEntry {
                id,
                label: label.into(),
                sink,
            },
        );
        Ok(id)
    }

    /// Remove a session. Unknown or already removed IDs are ignored.
    pub fn detach(&self, id: SessionId) -> Option<SessionEntry> {
        self.sessions.remove(&id).map(|(_, entry)| entry)
    }

    /// Get a session by ID
    pub fn get(&self, id: SessionId) -> Option<SessionEntry> {
        self.sessions.get(&id).map(|r| r.value().clone())
    }

    /// Check whether a session is attached
    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    /// Point-in-time copy of the attached sessions, ordered by ID
    pub fn snapshot(&self) -> Vec<SessionEntry> {
        let mut entries: Vec<SessionEntry> =
            self.sessions.iter().map(|r| r.value().clone()).collect();
        entries.sort_by_key(|e| e.id);
        entries
    }

    /// Number of attached sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
