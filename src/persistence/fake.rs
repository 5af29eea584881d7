//! In-process fake persistence for unit and integration tests
//!
//! [`FakePersistence`] keeps every collection in memory and lets a test make
//! individual operations fail through [`FailPoints`], so the best-effort and
//! transport-failure paths of the conversation core can be exercised without
//! a server.
//!
//! # Example
//!
//! ```
//! use askgenie::persistence::fake::FakePersistence;
//! use askgenie::persistence::{NewMessage, Persistence};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let store = FakePersistence::new();
//! let session = store.insert_session("u1", "New Chat").await.unwrap();
//!
//! store.fail_points().set_insert_message(true);
//! assert!(store
//!     .insert_message(&session.id, "u1", &NewMessage::user("hi"))
//!     .await
//!     .is_err());
//! # }
//! ```

use super::types::{Message, NewMessage, Session, UsageRecord};
use super::Persistence;
use crate::error::{GenieError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::oneshot;

/// Switches that make the matching operation fail with a transport error
#[derive(Debug, Default)]
pub struct FailPoints {
    insert_session: AtomicBool,
    list_sessions: AtomicBool,
    update_title: AtomicBool,
    insert_message: AtomicBool,
    list_messages: AtomicBool,
    get_usage: AtomicBool,
    increment: AtomicBool,
}

impl FailPoints {
    /// Fail `insert_session`
    pub fn set_insert_session(&self, fail: bool) {
        self.insert_session.store(fail, Ordering::SeqCst);
    }

    /// Fail `list_sessions` and `get_session`
    pub fn set_list_sessions(&self, fail: bool) {
        self.list_sessions.store(fail, Ordering::SeqCst);
    }

    /// Fail `update_session_title`
    pub fn set_update_title(&self, fail: bool) {
        self.update_title.store(fail, Ordering::SeqCst);
    }

    /// Fail `insert_message`
    pub fn set_insert_message(&self, fail: bool) {
        self.insert_message.store(fail, Ordering::SeqCst);
    }

    /// Fail `list_messages`
    pub fn set_list_messages(&self, fail: bool) {
        self.list_messages.store(fail, Ordering::SeqCst);
    }

    /// Fail `get_usage`
    pub fn set_get_usage(&self, fail: bool) {
        self.get_usage.store(fail, Ordering::SeqCst);
    }

    /// Fail `increment_message_count`
    pub fn set_increment(&self, fail: bool) {
        self.increment.store(fail, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool, operation: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(
                GenieError::Transport(format!("injected failure in {}", operation)).into(),
            );
        }
        Ok(())
    }
}

/// Pauses one call until the test releases it
#[derive(Debug)]
pub struct CallHold {
    reached: Option<oneshot::Receiver<()>>,
    release: oneshot::Sender<()>,
}

impl CallHold {
    /// Wait until the held call has started
    pub async fn reached(&mut self) {
        if let Some(reached) = self.reached.take() {
            let _ = reached.await;
        }
    }

    /// Let the held call complete
    pub fn release(self) {
        let _ = self.release.send(());
    }
}

type HeldCall = Mutex<Option<(oneshot::Sender<()>, oneshot::Receiver<()>)>>;

fn arm(slot: &HeldCall) -> CallHold {
    let (reached_tx, reached_rx) = oneshot::channel();
    let (release_tx, release_rx) = oneshot::channel();
    *slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some((reached_tx, release_rx));
    CallHold {
        reached: Some(reached_rx),
        release: release_tx,
    }
}

async fn pause_if_held(slot: &HeldCall) {
    let held = slot
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .take();
    if let Some((reached, release)) = held {
        let _ = reached.send(());
        let _ = release.await;
    }
}

#[derive(Debug, Default)]
struct Tables {
    sessions: Vec<Session>,
    messages: Vec<Message>,
    usage: Vec<UsageRecord>,
    clock: Option<DateTime<Utc>>,
}

impl Tables {
    /// Strictly increasing server clock
    fn now(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if let Some(last) = self.clock {
            if now <= last {
                now = last + Duration::microseconds(1);
            }
        }
        self.clock = Some(now);
        now
    }
}

/// In-memory [`Persistence`] implementation
#[derive(Debug, Default)]
pub struct FakePersistence {
    tables: Mutex<Tables>,
    fail_points: FailPoints,
    increments: AtomicUsize,
    held_increment: HeldCall,
    held_insert_message: HeldCall,
}

impl FakePersistence {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Access the failure switches
    pub fn fail_points(&self) -> &FailPoints {
        &self.fail_points
    }

    /// Pause the next `increment_message_count` until released
    pub fn hold_increment(&self) -> CallHold {
        arm(&self.held_increment)
    }

    /// Pause the next `insert_message` until released
    pub fn hold_insert_message(&self) -> CallHold {
        arm(&self.held_insert_message)
    }

    /// Seed a usage record, replacing any existing one
    pub fn put_usage(&self, record: UsageRecord) {
        let mut tables = self.lock();
        tables.usage.retain(|u| u.owner_id != record.owner_id);
        tables.usage.push(record);
    }

    /// Every stored message, across sessions, in insertion order
    pub fn all_messages(&self) -> Vec<Message> {
        self.lock().messages.clone()
    }

    /// Look up a session by id
    pub fn session(&self, session_id: &str) -> Option<Session> {
        self.lock()
            .sessions
            .iter()
            .find(|s| s.id == session_id)
            .cloned()
    }

    /// Number of successful increment calls
    pub fn increment_calls(&self) -> usize {
        self.increments.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Persistence for FakePersistence {
    async fn insert_session(&self, owner_id: &str, title: &str) -> Result<Session> {
        FailPoints::check(&self.fail_points.insert_session, "insert_session")?;
        let mut tables = self.lock();
        let now = tables.now();
        let session = Session {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            title: title.to_string(),
            created_at: now,
            updated_at: now,
        };
        tables.sessions.push(session.clone());
        Ok(session)
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        FailPoints::check(&self.fail_points.list_sessions, "get_session")?;
        Ok(self.session(session_id))
    }

    async fn list_sessions(&self, owner_id: &str, limit: usize) -> Result<Vec<Session>> {
        FailPoints::check(&self.fail_points.list_sessions, "list_sessions")?;
        let tables = self.lock();
        let mut sessions: Vec<Session> = tables
            .sessions
            .iter()
            .filter(|s| s.owner_id == owner_id)
            .cloned()
            .collect();
        sessions.reverse();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        sessions.truncate(limit);
        Ok(sessions)
    }

    async fn update_session_title(&self, session_id: &str, title: &str) -> Result<()> {
        FailPoints::check(&self.fail_points.update_title, "update_session_title")?;
        let mut tables = self.lock();
        let now = tables.now();
        let session = tables
            .sessions
            .iter_mut()
            .find(|s| s.id == session_id)
            .ok_or_else(|| GenieError::Storage(format!("Session not found: {}", session_id)))?;
        session.title = title.to_string();
        session.updated_at = now;
        Ok(())
    }

    async fn insert_message(
        &self,
        session_id: &str,
        owner_id: &str,
        message: &NewMessage,
    ) -> Result<Message> {
        pause_if_held(&self.held_insert_message).await;
        FailPoints::check(&self.fail_points.insert_message, "insert_message")?;
        let mut tables = self.lock();
        let created_at = tables.now();
        let stored = Message {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            owner_id: owner_id.to_string(),
            role: message.role,
            content: message.content.clone(),
            citations: message.citations.clone(),
            created_at,
        };
        tables.messages.push(stored.clone());
        Ok(stored)
    }

    async fn list_messages(&self, session_id: &str) -> Result<Vec<Message>> {
        FailPoints::check(&self.fail_points.list_messages, "list_messages")?;
        let tables = self.lock();
        let mut messages: Vec<Message> = tables
            .messages
            .iter()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(messages)
    }

    async fn get_usage(&self, owner_id: &str) -> Result<Option<UsageRecord>> {
        FailPoints::check(&self.fail_points.get_usage, "get_usage")?;
        Ok(self
            .lock()
            .usage
            .iter()
            .find(|u| u.owner_id == owner_id)
            .cloned())
    }

    async fn insert_usage(&self, record: &UsageRecord) -> Result<()> {
        let mut tables = self.lock();
        if !tables.usage.iter().any(|u| u.owner_id == record.owner_id) {
            tables.usage.push(record.clone());
        }
        Ok(())
    }

    async fn increment_message_count(&self, owner_id: &str) -> Result<i64> {
        pause_if_held(&self.held_increment).await;
        FailPoints::check(&self.fail_points.increment, "increment_message_count")?;
        let mut tables = self.lock();
        let count = match tables.usage.iter_mut().find(|u| u.owner_id == owner_id) {
            Some(record) => {
                record.messages_used += 1;
                record.messages_used
            }
            None => {
                let mut record = UsageRecord::fresh(owner_id);
                record.messages_used = 1;
                tables.usage.push(record);
                1
            }
        };
        self.increments.fetch_add(1, Ordering::SeqCst);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clock_is_strictly_increasing() {
        let store = FakePersistence::new();
        let session = store.insert_session("u1", "New Chat").await.unwrap();
        for i in 0..20 {
            store
                .insert_message(&session.id, "u1", &NewMessage::user(format!("m{}", i)))
                .await
                .unwrap();
        }
        let messages = store.list_messages(&session.id).await.unwrap();
        assert!(messages
            .windows(2)
            .all(|w| w[0].created_at < w[1].created_at));
        assert_eq!(messages[0].content, "m0");
    }

    #[tokio::test]
    async fn test_fail_points() {
        let store = FakePersistence::new();
        store.fail_points().set_increment(true);
        assert!(store.increment_message_count("u1").await.is_err());
        assert_eq!(store.increment_calls(), 0);

        store.fail_points().set_increment(false);
        assert_eq!(store.increment_message_count("u1").await.unwrap(), 1);
        assert_eq!(store.increment_calls(), 1);
    }

    #[tokio::test]
    async fn test_held_increment_waits_for_release() {
        let store = std::sync::Arc::new(FakePersistence::new());
        let mut hold = store.hold_increment();

        let task = {
            let store = store.clone();
            tokio::spawn(async move { store.increment_message_count("u1").await })
        };
        hold.reached().await;
        assert_eq!(store.increment_calls(), 0);

        hold.release();
        assert_eq!(task.await.unwrap().unwrap(), 1);
        assert_eq!(store.increment_message_count("u1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_list_sessions_limit() {
        let store = FakePersistence::new();
        for _ in 0..5 {
            store.insert_session("u1", "New Chat").await.unwrap();
        }
        let sessions = store.list_sessions("u1", 3).await.unwrap();
        assert_eq!(sessions.len(), 3);
        assert!(sessions[0].created_at > sessions[1].created_at);
    }
}
