//! Outcome push registry
//!
//! Tracks live outcome-notification channels per wallet owner using DashMap
//! for concurrent access. Supports multiple sessions per owner (e.g., mobile
//! and web). The registry is created at service start and cleared at
//! shutdown; actual delivery transport (SSE, WebSocket, push) lives outside
//! the core and only consumes the receiver half.

use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Terminal transfer outcome pushed to the initiating owner.
#[derive(Debug, Clone, Serialize)]
pub struct OutcomeNotice {
    pub txn_id: String,
    pub status: String,
    pub message: String,
}

pub type NoticeSender = mpsc::UnboundedSender<OutcomeNotice>;

/// Unique session identifier
pub type SessionId = u64;

/// Concurrency-safe keyed registry of push sessions.
pub struct PushRegistry {
    /// owner_id -> list of (session_id, sender)
    sessions: DashMap<Uuid, Vec<(SessionId, NoticeSender)>>,
    next_session_id: AtomicU64,
}

impl PushRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            next_session_id: AtomicU64::new(1),
        }
    }

    /// Register a new push session for an owner.
    ///
    /// Returns the unique session ID for later removal.
    pub fn add_session(&self, owner_id: Uuid, tx: NoticeSender) -> SessionId {
        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);

        self.sessions
            .entry(owner_id)
            .or_insert_with(Vec::new)
            .push((session_id, tx));

        tracing::info!(%owner_id, session_id, "Push session added");
        session_id
    }

    /// Remove a push session. Cleans up empty owner entries.
    pub fn remove_session(&self, owner_id: Uuid, session_id: SessionId) {
        if let Some(mut senders) = self.sessions.get_mut(&owner_id) {
            senders.retain(|(id, _)| *id != session_id);

            if senders.is_empty() {
                drop(senders); // Release the shard lock before removal
                self.sessions.remove(&owner_id);
            }
            tracing::info!(%owner_id, session_id, "Push session removed");
        }
    }

    /// Send a notice to all sessions of an owner.
    ///
    /// Closed sessions are skipped; removal stays with the transport handler
    /// that owns the session lifecycle.
    pub fn send_to_owner(&self, owner_id: Uuid, notice: OutcomeNotice) {
        if let Some(senders) = self.sessions.get(&owner_id) {
            for (session_id, tx) in senders.iter() {
                if tx.send(notice.clone()).is_err() {
                    tracing::warn!(%owner_id, session_id, "Push session closed, notice dropped");
                }
            }
        }
    }

    /// Returns (number of owners, total sessions).
    pub fn stats(&self) -> (usize, usize) {
        let owners = self.sessions.len();
        let total: usize = self.sessions.iter().map(|entry| entry.value().len()).sum();
        (owners, total)
    }

    /// Drop every registered session. Called at service shutdown.
    pub fn clear(&self) {
        self.sessions.clear();
    }
}

impl Default for PushRegistry {
    fn default() -> Self {
        Self::new()
    }
}
