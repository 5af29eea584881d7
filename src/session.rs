//! Session store
//!
//! Owns conversation session identity and message history on top of the
//! [`Persistence`] boundary. Reads propagate errors; message writes and
//! renames are best-effort and only log on failure.

use crate::config::ChatConfig;
use crate::error::Result;
use crate::persistence::{Message, NewMessage, Persistence, Session};
use std::sync::Arc;

/// Session and message history access for one owner's conversation views
#[derive(Clone)]
pub struct SessionStore {
    persistence: Arc<dyn Persistence>,
    placeholder_title: String,
    title_max_chars: usize,
}

impl SessionStore {
    /// Create a store with the configured placeholder title and title length
    pub fn new(persistence: Arc<dyn Persistence>, chat: &ChatConfig) -> Self {
        Self {
            persistence,
            placeholder_title: chat.placeholder_title.clone(),
            title_max_chars: chat.title_max_chars,
        }
    }

    /// The most recently created session, or a new one when none exists
    ///
    /// Recency is by creation time, not by last view.
    pub async fn ensure_active_session(&self, owner_id: &str) -> Result<Session> {
        let mut latest = self.persistence.list_sessions(owner_id, 1).await?;
        match latest.pop() {
            Some(session) => {
                tracing::debug!(session = %session.id, "Resuming most recent session");
                Ok(session)
            }
            None => self.create_session(owner_id).await,
        }
    }

    /// Sessions of an owner, newest first
    pub async fn list_recent(&self, owner_id: &str, limit: usize) -> Result<Vec<Session>> {
        self.persistence.list_sessions(owner_id, limit).await
    }

    /// A session by id
    pub async fn find_session(&self, session_id: &str) -> Result<Option<Session>> {
        self.persistence.get_session(session_id).await
    }

    /// Persisted turns of a session, oldest first; empty for a new session
    pub async fn load_history(&self, session_id: &str) -> Result<Vec<Message>> {
        self.persistence.list_messages(session_id).await
    }

    /// Always create a new placeholder-titled session
    pub async fn create_session(&self, owner_id: &str) -> Result<Session> {
        let session = self
            .persistence
            .insert_session(owner_id, &self.placeholder_title)
            .await?;
        tracing::info!(session = %session.id, "Created chat session");
        Ok(session)
    }

    /// Persist one turn, best-effort
    ///
    /// A failed write is logged and reported as `None`; the caller keeps
    /// its in-memory turn.
    pub async fn append_message(
        &self,
        session_id: &str,
        owner_id: &str,
        message: &NewMessage,
    ) -> Option<Message> {
        match self
            .persistence
            .insert_message(session_id, owner_id, message)
            .await
        {
            Ok(stored) => Some(stored),
            Err(e) => {
                tracing::warn!(
                    session = session_id,
                    role = %message.role,
                    "Error saving message: {:#}",
                    e
                );
                None
            }
        }
    }

    /// Title a session from its first user message, best-effort
    ///
    /// Returns the new title when the update was stored.
    pub async fn rename_from_first_user_turn(
        &self,
        session_id: &str,
        content: &str,
    ) -> Option<String> {
        let title = truncate_title(content, self.title_max_chars);
        match self
            .persistence
            .update_session_title(session_id, &title)
            .await
        {
            Ok(()) => {
                tracing::debug!(session = session_id, title = %title, "Renamed session");
                Some(title)
            }
            Err(e) => {
                tracing::warn!(session = session_id, "Error updating session title: {:#}", e);
                None
            }
        }
    }
}

/// First `max_chars` characters of `content`
pub fn truncate_title(content: &str, max_chars: usize) -> String {
    content.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::fake::FakePersistence;
    use crate::persistence::Role;

    fn store() -> (SessionStore, Arc<FakePersistence>) {
        let fake = Arc::new(FakePersistence::new());
        (SessionStore::new(fake.clone(), &ChatConfig::default()), fake)
    }

    #[test]
    fn test_truncate_title_counts_chars() {
        assert_eq!(truncate_title("short", 50), "short");
        let long = "x".repeat(80);
        assert_eq!(truncate_title(&long, 50).len(), 50);
        assert_eq!(truncate_title("héllo wörld", 4), "héll");
    }

    #[tokio::test]
    async fn test_ensure_active_session_creates_then_resumes() {
        let (store, _fake) = store();
        let created = store.ensure_active_session("u1").await.unwrap();
        assert_eq!(created.title, "New Chat");

        let resumed = store.ensure_active_session("u1").await.unwrap();
        assert_eq!(resumed.id, created.id);

        let newer = store.create_session("u1").await.unwrap();
        let resumed = store.ensure_active_session("u1").await.unwrap();
        assert_eq!(resumed.id, newer.id);
    }

    #[tokio::test]
    async fn test_ensure_active_session_propagates_read_errors() {
        let (store, fake) = store();
        fake.fail_points().set_list_sessions(true);
        assert!(store.ensure_active_session("u1").await.is_err());
    }

    #[tokio::test]
    async fn test_append_message_best_effort() {
        let (store, fake) = store();
        let session = store.create_session("u1").await.unwrap();

        let stored = store
            .append_message(&session.id, "u1", &NewMessage::user("hello"))
            .await
            .unwrap();
        assert_eq!(stored.role, Role::User);

        fake.fail_points().set_insert_message(true);
        assert!(store
            .append_message(&session.id, "u1", &NewMessage::user("lost"))
            .await
            .is_none());

        let history = store.load_history(&session.id).await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn test_rename_truncates() {
        let (store, fake) = store();
        let session = store.create_session("u1").await.unwrap();
        let content = "a".repeat(70);

        let title = store
            .rename_from_first_user_turn(&session.id, &content)
            .await
            .unwrap();
        assert_eq!(title.chars().count(), 50);
        assert_eq!(fake.session(&session.id).unwrap().title, title);
    }

    #[tokio::test]
    async fn test_rename_failure_is_swallowed() {
        let (store, fake) = store();
        let session = store.create_session("u1").await.unwrap();
        fake.fail_points().set_update_title(true);
        assert!(store
            .rename_from_first_user_turn(&session.id, "hello")
            .await
            .is_none());
        assert_eq!(fake.session(&session.id).unwrap().title, "New Chat");
    }

    #[tokio::test]
    async fn test_list_recent() {
        let (store, _fake) = store();
        for _ in 0..12 {
            store.create_session("u1").await.unwrap();
        }
        assert_eq!(store.list_recent("u1", 10).await.unwrap().len(), 10);
    }
}
