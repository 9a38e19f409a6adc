//! Per-session conversation memory.
//!
//! An in-process map: one history per session id, created on first
//! message, dropped on demand. Sessions do not survive a restart and are
//! not shared across instances.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::llm::ChatMessage;

#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Vec<ChatMessage>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        SessionStore::default()
    }

    /// Clones the history for a session, if one exists.
    pub async fn history(&self, session_id: &str) -> Option<Vec<ChatMessage>> {
        self.sessions.read().await.get(session_id).cloned()
    }

    pub async fn replace(&self, session_id: &str, messages: Vec<ChatMessage>) {
        self.sessions
            .write()
            .await
            .insert(session_id.to_string(), messages);
    }

    /// Removes a session. Returns false when it never existed.
    pub async fn clear(&self, session_id: &str) -> bool {
        self.sessions.write().await.remove(session_id).is_some()
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sessions_are_isolated_and_clearable() {
        let store = SessionStore::new();
        assert!(store.history("a").await.is_none());

        store.replace("a", vec![ChatMessage::user("hi")]).await;
        store.replace("b", vec![ChatMessage::user("yo")]).await;
        assert_eq!(store.active_count().await, 2);
        assert_eq!(
            store.history("a").await.map(|h| h.len()),
            Some(1)
        );

        assert!(store.clear("a").await);
        assert!(!store.clear("a").await);
        assert_eq!(store.active_count().await, 1);
    }
}
