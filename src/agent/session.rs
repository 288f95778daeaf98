//! In-memory sessions
//!
//! A session is one chat: its state map and the running transcript the root
//! agent sees. Sessions live only as long as the process; durable history is
//! in the store.

use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::state::{keys, SessionState};
use crate::claude::ChatMessage;

/// Transcript messages kept per session (user + assistant pairs)
pub const MAX_TRANSCRIPT_MESSAGES: usize = 40;

/// Handle to one chat session
#[derive(Clone)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub state: SessionState,
    transcript: Arc<Mutex<Vec<ChatMessage>>>,
    pub created_at: i64,
}

impl Session {
    fn new(id: String, user_id: &str, mut initial: Map<String, Value>) -> Self {
        initial
            .entry(keys::SESSION_ID.to_string())
            .or_insert_with(|| Value::String(id.clone()));

        Self {
            id,
            user_id: user_id.to_string(),
            state: SessionState::new(initial),
            transcript: Arc::default(),
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn transcript(&self) -> Vec<ChatMessage> {
        self.transcript.lock().clone()
    }

    /// Record a finished exchange, dropping the oldest pairs past the cap
    pub fn record_exchange(&self, user_text: &str, assistant_text: &str) {
        let mut transcript = self.transcript.lock();
        transcript.push(ChatMessage::user_text(user_text));
        transcript.push(ChatMessage::assistant_text(assistant_text));

        let excess = transcript.len().saturating_sub(MAX_TRANSCRIPT_MESSAGES);
        // Keep pairs intact so the transcript always starts with a user turn
        let excess = excess + excess % 2;
        if excess > 0 {
            transcript.drain(..excess);
        }
    }
}

/// Keeps sessions by ID
#[derive(Default)]
pub struct SessionService {
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session, generating an ID when none is given.
    /// An existing session with the same ID is replaced.
    pub fn create_session(&self, user_id: &str, session_id: Option<&str>, initial: Map<String, Value>) -> Session {
        let id = session_id
            .map(|s| s.to_string())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let session = Session::new(id.clone(), user_id, initial);
        info!("Created session {} for {}", id, user_id);
        self.sessions.write().insert(id, session.clone());
        session
    }

    pub fn get_session(&self, session_id: &str) -> Option<Session> {
        self.sessions.read().get(session_id).cloned()
    }

    pub fn delete_session(&self, session_id: &str) -> bool {
        let removed = self.sessions.write().remove(session_id).is_some();
        if removed {
            debug!("Deleted session {}", session_id);
        }
        removed
    }

    /// Sessions belonging to a user, oldest first
    pub fn list_sessions(&self, user_id: &str) -> Vec<Session> {
        let mut sessions: Vec<Session> = self
            .sessions
            .read()
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.created_at);
        sessions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_get() {
        let service = SessionService::new();
        let session = service.create_session("alice", Some("s1"), Map::new());

        assert_eq!(session.state.get_str(keys::SESSION_ID).as_deref(), Some("s1"));
        assert!(service.get_session("s1").is_some());
        assert_eq!(service.list_sessions("alice").len(), 1);
        assert!(service.list_sessions("bob").is_empty());

        assert!(service.delete_session("s1"));
        assert!(!service.delete_session("s1"));
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let service = SessionService::new();
        let a = service.create_session("alice", None, Map::new());
        let b = service.create_session("alice", None, Map::new());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_state_is_shared_between_handles() {
        let service = SessionService::new();
        let session = service.create_session("alice", Some("s1"), Map::new());
        session.state.set("x", 1);

        let again = service.get_session("s1").unwrap();
        assert_eq!(again.state.get("x"), Some(Value::from(1)));
    }

    #[test]
    fn test_transcript_capped_in_pairs() {
        let service = SessionService::new();
        let session = service.create_session("alice", None, Map::new());
        for i in 0..(MAX_TRANSCRIPT_MESSAGES / 2 + 3) {
            session.record_exchange(&format!("q{}", i), &format!("a{}", i));
        }

        let transcript = session.transcript();
        assert_eq!(transcript.len(), MAX_TRANSCRIPT_MESSAGES);
        assert_eq!(transcript[0].role, crate::claude::Role::User);
        assert_eq!(transcript[0].text(), "q3");
    }
}
