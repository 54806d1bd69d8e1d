//! Chat sessions
//!
//! A [`ChatSession`] is an ordered turn history seeded with one greeting
//! exchange. The [`SessionStore`] keeps one session per client, each behind
//! its own async mutex so concurrent sends to the same session serialise
//! while different sessions proceed independently.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use uuid::Uuid;

use crate::ai::{GenAiError, GenerativeBackend, Turn};
use crate::config::SessionsConfig;

/// Opening user turn of every session.
pub const SEED_USER_TURN: &str = "Hello";
/// Opening model turn of every session.
pub const SEED_MODEL_TURN: &str = "Great to meet you. What would you like to know?";

/// Session errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("message must not be empty")]
    EmptyMessage,

    #[error("session not found: {0}")]
    NotFound(Uuid),

    #[error("session limit reached ({0} active sessions)")]
    Full(usize),

    #[error(transparent)]
    Backend(#[from] GenAiError),
}

/// A conversation with the chat model
#[derive(Debug, Clone, Serialize)]
pub struct ChatSession {
    pub id: Uuid,
    turns: Vec<Turn>,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    /// Create a session holding the seed exchange.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            turns: vec![Turn::user(SEED_USER_TURN), Turn::model(SEED_MODEL_TURN)],
            created_at: now,
            last_active: now,
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Send a user message and record the exchange.
    ///
    /// The history is only extended when the backend replies; a failed send
    /// leaves the session as it was.
    pub async fn send(
        &mut self,
        backend: &dyn GenerativeBackend,
        model: &str,
        message: &str,
    ) -> Result<String, SessionError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(SessionError::EmptyMessage);
        }

        let mut history = Vec::with_capacity(self.turns.len() + 1);
        history.extend_from_slice(&self.turns);
        history.push(Turn::user(message));

        self.last_active = Utc::now();
        let reply = match backend.chat(model, &history).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(session_id = %self.id, error = %e, "chat send failed");
                return Err(e.into());
            }
        };

        self.turns.push(Turn::user(message));
        self.turns.push(Turn::model(reply.clone()));
        tracing::debug!(session_id = %self.id, turns = self.turns.len(), "chat exchange recorded");
        Ok(reply)
    }
}

/// Shared handle to one session
pub type SessionHandle = Arc<tokio::sync::Mutex<ChatSession>>;

/// In-memory registry of chat sessions
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, SessionHandle>>,
    max_sessions: usize,
    idle_ttl: Duration,
}

impl SessionStore {
    pub fn new(config: &SessionsConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions: config.max_sessions,
            idle_ttl: Duration::from_secs(config.idle_ttl_secs),
        }
    }

    /// Create a session, evicting idle ones first.
    pub fn create(&self) -> Result<(Uuid, SessionHandle), SessionError> {
        self.prune_idle();

        let mut sessions = self.sessions.write();
        if sessions.len() >= self.max_sessions {
            tracing::warn!(active = sessions.len(), "session limit reached");
            return Err(SessionError::Full(sessions.len()));
        }
        let session = ChatSession::new();
        let id = session.id;
        let handle = Arc::new(tokio::sync::Mutex::new(session));
        sessions.insert(id, handle.clone());
        tracing::info!(session_id = %id, active = sessions.len(), "chat session created");
        Ok((id, handle))
    }

    pub fn get(&self, id: Uuid) -> Result<SessionHandle, SessionError> {
        self.sessions
            .read()
            .get(&id)
            .cloned()
            .ok_or(SessionError::NotFound(id))
    }

    pub fn remove(&self, id: Uuid) -> Result<(), SessionError> {
        match self.sessions.write().remove(&id) {
            Some(_) => {
                tracing::info!(session_id = %id, "chat session removed");
                Ok(())
            }
            None => Err(SessionError::NotFound(id)),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop sessions idle for longer than the configured TTL. Sessions
    /// currently locked by a request are in use and kept.
    pub fn prune_idle(&self) -> usize {
        let ttl = match chrono::Duration::from_std(self.idle_ttl) {
            Ok(ttl) => ttl,
            Err(_) => return 0,
        };
        let cutoff = Utc::now() - ttl;

        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, handle| match handle.try_lock() {
            Ok(session) => session.last_active >= cutoff,
            Err(_) => true,
        });
        let removed = before - sessions.len();
        if removed > 0 {
            tracing::info!(removed, "pruned idle chat sessions");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::mock::ScriptedBackend;
    use crate::ai::Role;

    fn store(max_sessions: usize) -> SessionStore {
        SessionStore::new(&SessionsConfig {
            max_sessions,
            idle_ttl_secs: 3600,
        })
    }

    // ==================== ChatSession tests ====================

    #[test]
    fn test_new_session_is_seeded() {
        let session = ChatSession::new();
        assert_eq!(
            session.turns(),
            &[Turn::user(SEED_USER_TURN), Turn::model(SEED_MODEL_TURN)]
        );
    }

    #[tokio::test]
    async fn test_turn_count_after_sends() {
        let backend = ScriptedBackend::default()
            .reply(Ok("one".to_string()))
            .reply(Ok("two".to_string()))
            .reply(Ok("three".to_string()));
        let mut session = ChatSession::new();

        for (n, message) in ["a", "b", "c"].iter().enumerate() {
            session.send(&backend, "chat-model", message).await.unwrap();
            assert_eq!(session.turns().len(), 2 + 2 * (n + 1));
        }

        let roles: Vec<Role> = session.turns().iter().map(|t| t.role).collect();
        for (i, role) in roles.iter().enumerate() {
            let expected = if i % 2 == 0 { Role::User } else { Role::Model };
            assert_eq!(*role, expected);
        }
        assert_eq!(session.turns()[2], Turn::user("a"));
        assert_eq!(session.turns()[7], Turn::model("three"));
    }

    #[tokio::test]
    async fn test_send_includes_history_and_new_message() {
        let backend = ScriptedBackend::default();
        let mut session = ChatSession::new();
        session.send(&backend, "chat-model", "  Why is the sky blue? ").await.unwrap();

        let calls = backend.chat_calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].len(), 3);
        assert_eq!(calls[0][2], Turn::user("Why is the sky blue?"));
    }

    #[tokio::test]
    async fn test_failed_send_appends_nothing() {
        let backend = ScriptedBackend::default()
            .reply(Err(GenAiError::Timeout))
            .reply(Ok("recovered".to_string()));
        let mut session = ChatSession::new();

        let err = session.send(&backend, "m", "hello?").await.unwrap_err();
        assert!(matches!(err, SessionError::Backend(GenAiError::Timeout)));
        assert_eq!(session.turns().len(), 2);

        session.send(&backend, "m", "hello?").await.unwrap();
        assert_eq!(session.turns().len(), 4);
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let backend = ScriptedBackend::default();
        let mut session = ChatSession::new();

        let err = session.send(&backend, "m", "   ").await.unwrap_err();
        assert!(matches!(err, SessionError::EmptyMessage));
        assert!(backend.chat_calls.lock().is_empty());
    }

    // ==================== SessionStore tests ====================

    #[test]
    fn test_store_create_get_remove() {
        let store = store(4);
        let (id, _) = store.create().unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.get(id).is_ok());

        store.remove(id).unwrap();
        assert!(store.is_empty());
        assert!(matches!(store.get(id), Err(SessionError::NotFound(_))));
        assert!(matches!(store.remove(id), Err(SessionError::NotFound(_))));
    }

    #[test]
    fn test_store_capacity() {
        let store = store(2);
        store.create().unwrap();
        store.create().unwrap();
        assert!(matches!(store.create(), Err(SessionError::Full(2))));
    }

    #[test]
    fn test_sessions_are_independent() {
        let store = store(4);
        let (a, _) = store.create().unwrap();
        let (b, _) = store.create().unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_prune_idle_removes_stale_sessions() {
        let store = store(4);
        let (stale, handle) = store.create().unwrap();
        let (fresh, _) = store.create().unwrap();
        handle.lock().await.last_active = Utc::now() - chrono::Duration::hours(2);

        assert_eq!(store.prune_idle(), 1);
        assert!(store.get(stale).is_err());
        assert!(store.get(fresh).is_ok());
    }

    #[tokio::test]
    async fn test_prune_keeps_locked_sessions() {
        let store = store(4);
        let (id, handle) = store.create().unwrap();
        let mut guard = handle.lock().await;
        guard.last_active = Utc::now() - chrono::Duration::hours(2);

        assert_eq!(store.prune_idle(), 0);
        drop(guard);
        assert!(store.get(id).is_ok());
    }
}
