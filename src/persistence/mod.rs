//! Persistence boundary for sessions, messages and usage counters
//!
//! The conversation core talks to the persistence service only through the
//! [`Persistence`] trait. Three backends are provided:
//!
//! - [`RestPersistence`]: the remote PostgREST-style service
//! - [`SqlitePersistence`]: a local SQLite file
//! - [`fake::FakePersistence`]: in-process store with fault injection for tests
//!
//! Identifiers and timestamps are always assigned by the backend, and the
//! usage counter only moves through [`Persistence::increment_message_count`].

use crate::config::{PersistenceBackend, PersistenceConfig};
use crate::error::{GenieError, Result};
use async_trait::async_trait;
use std::sync::Arc;

pub mod fake;
pub mod rest;
pub mod sqlite;
pub mod types;

pub use rest::RestPersistence;
pub use sqlite::SqlitePersistence;
pub use types::{Message, NewMessage, Role, Session, UsageRecord};

/// Record CRUD over the `sessions`, `messages` and `usage` collections
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Insert a session and return the stored row
    async fn insert_session(&self, owner_id: &str, title: &str) -> Result<Session>;

    /// A session by id, `None` when absent
    async fn get_session(&self, session_id: &str) -> Result<Option<Session>>;

    /// Sessions of an owner, newest `created_at` first
    async fn list_sessions(&self, owner_id: &str, limit: usize) -> Result<Vec<Session>>;

    /// Change the title of a session
    async fn update_session_title(&self, session_id: &str, title: &str) -> Result<()>;

    /// Insert a message and return the stored row
    async fn insert_message(
        &self,
        session_id: &str,
        owner_id: &str,
        message: &NewMessage,
    ) -> Result<Message>;

    /// Messages of a session, oldest `created_at` first
    async fn list_messages(&self, session_id: &str) -> Result<Vec<Message>>;

    /// Usage record of an owner, `None` when absent
    async fn get_usage(&self, owner_id: &str) -> Result<Option<UsageRecord>>;

    /// Insert the default usage record for an owner
    async fn insert_usage(&self, record: &UsageRecord) -> Result<()>;

    /// Server-side atomic increment; returns the new count
    async fn increment_message_count(&self, owner_id: &str) -> Result<i64>;
}

/// Open the SQLite store at the configured path, or the data directory
///
/// # Errors
///
/// Returns `GenieError::Storage` if the database cannot be opened
pub fn open_sqlite(config: &PersistenceConfig) -> Result<SqlitePersistence> {
    match &config.sqlite_path {
        Some(path) => SqlitePersistence::new_with_path(path),
        None => SqlitePersistence::new(),
    }
}

/// Create a persistence backend from configuration
///
/// # Errors
///
/// Returns error if the backend cannot be initialized
pub fn create_persistence(config: &PersistenceConfig) -> Result<Arc<dyn Persistence>> {
    match config.backend {
        PersistenceBackend::Sqlite => Ok(Arc::new(open_sqlite(config)?)),
        PersistenceBackend::Rest => {
            let base_url = config.base_url.clone().ok_or_else(|| {
                GenieError::Config("persistence.base_url is required".to_string())
            })?;
            Ok(Arc::new(RestPersistence::new(
                base_url,
                config.api_key.clone(),
                config.access_token.clone(),
            )?))
        }
    }
}
