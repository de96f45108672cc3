use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;

use super::models::{PreviewId, PreviewSession, SessionUpdate};
use crate::errors::PreviewError;

/// Proof of having created a session. Writes made through a ticket are
/// dropped once a newer `create` (or a `remove`) has replaced the entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTicket {
    pub id: PreviewId,
    pub generation: u64,
}

struct Entry {
    generation: u64,
    session: PreviewSession,
}

/// In-memory table of preview sessions, shared by the HTTP boundary and
/// every pipeline task. Constructed once per process and passed around in an `Arc`.
pub struct PreviewRegistry {
    sessions: RwLock<HashMap<PreviewId, Entry>>,
    next_generation: AtomicU64,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Insert a fresh `queued` session, replacing any previous session with
    /// the same id.
    pub async fn create(&self, id: PreviewId) -> SessionTicket {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let mut sessions = self.sessions.write().await;
        let replaced = sessions
            .insert(
                id.clone(),
                Entry {
                    generation,
                    session: PreviewSession::new(),
                },
            )
            .is_some();
        if replaced {
            tracing::debug!(id = %id, generation, "replaced existing preview session");
        }
        SessionTicket { id, generation }
    }

    /// Merge `update` into the current session for `id`, whichever generation it is.
    pub async fn update(
        &self,
        id: &PreviewId,
        update: SessionUpdate,
    ) -> Result<PreviewSession, PreviewError> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .get_mut(id)
            .ok_or_else(|| PreviewError::not_found(id.as_str()))?;
        entry.session.apply(update)?;
        Ok(entry.session.clone())
    }

    /// Merge `update` only if `ticket` still owns the entry. Returns `Ok(false)`
    /// when the session has been superseded or removed.
    pub async fn update_if_current(
        &self,
        ticket: &SessionTicket,
        update: SessionUpdate,
    ) -> Result<bool, PreviewError> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&ticket.id) {
            Some(entry) if entry.generation == ticket.generation => {
                entry.session.apply(update)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    pub async fn is_current(&self, ticket: &SessionTicket) -> bool {
        self.sessions
            .read()
            .await
            .get(&ticket.id)
            .is_some_and(|entry| entry.generation == ticket.generation)
    }

    /// Snapshot of the session for `id`.
    pub async fn read(&self, id: &PreviewId) -> Result<PreviewSession, PreviewError> {
        self.sessions
            .read()
            .await
            .get(id)
            .map(|entry| entry.session.clone())
            .ok_or_else(|| PreviewError::not_found(id.as_str()))
    }

    /// Delete the entry for `id`. Performs no external cleanup.
    pub async fn remove(&self, id: &PreviewId) -> Result<PreviewSession, PreviewError> {
        self.sessions
            .write()
            .await
            .remove(id)
            .map(|entry| entry.session)
            .ok_or_else(|| PreviewError::not_found(id.as_str()))
    }

    /// All sessions, ordered by id.
    pub async fn list(&self) -> Vec<(PreviewId, PreviewSession)> {
        let sessions = self.sessions.read().await;
        let mut all: Vec<_> = sessions
            .iter()
            .map(|(id, entry)| (id.clone(), entry.session.clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

impl Default for PreviewRegistry {
    fn default() -> Self {
        Self::new()
    }
}
