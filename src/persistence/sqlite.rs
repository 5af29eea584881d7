use super::types::{Message, NewMessage, Role, Session, UsageRecord};
use super::Persistence;
use crate::error::{GenieError, Result};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use directories::ProjectDirs;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::PathBuf;

/// Local persistence backend on a SQLite file
///
/// Timestamps are stored as fixed-precision RFC-3339 text so that string
/// order equals time order; `rowid` breaks ties between equal timestamps.
pub struct SqlitePersistence {
    db_path: PathBuf,
}

fn storage_err(e: anyhow::Error) -> GenieError {
    GenieError::Storage(format!("{:#}", e))
}

fn timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        title: row.get(2)?,
        created_at: parse_timestamp(row, 3)?,
        updated_at: parse_timestamp(row, 4)?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    let role: String = row.get(3)?;
    let role = Role::parse_str(&role).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            Type::Text,
            format!("unknown role: {}", role).into(),
        )
    })?;
    let citations_json: String = row.get(5)?;
    let citations = serde_json::from_str(&citations_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;

    Ok(Message {
        id: row.get(0)?,
        session_id: row.get(1)?,
        owner_id: row.get(2)?,
        role,
        content: row.get(4)?,
        citations,
        created_at: parse_timestamp(row, 6)?,
    })
}

impl SqlitePersistence {
    /// Create a store in the user's data directory
    ///
    /// # Errors
    ///
    /// Returns `GenieError::Storage` if the directory or schema cannot be created
    pub fn new() -> Result<Self> {
        let proj_dirs = ProjectDirs::from("com", "askgenie", "askgenie")
            .ok_or_else(|| GenieError::Storage("Could not determine data directory".into()))?;

        Self::new_with_path(proj_dirs.data_dir().join("askgenie.db"))
    }

    /// Create a store at the specified database path
    ///
    /// # Examples
    ///
    /// ```
    /// use askgenie::persistence::SqlitePersistence;
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let storage = SqlitePersistence::new_with_path(dir.path().join("chat.db")).unwrap();
    /// ```
    pub fn new_with_path<P: Into<PathBuf>>(db_path: P) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create parent directory for database")
                .map_err(storage_err)?;
        }

        let storage = Self { db_path };
        storage.init()?;
        tracing::debug!(path = %storage.db_path.display(), "Opened sqlite persistence");
        Ok(storage)
    }

    fn open(&self) -> Result<Connection> {
        Ok(Connection::open(&self.db_path)
            .context("Failed to open database")
            .map_err(storage_err)?)
    }

    fn init(&self) -> Result<()> {
        let conn = self.open()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS chat_sessions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL REFERENCES chat_sessions(id),
                user_id TEXT NOT NULL,
                role TEXT NOT NULL CHECK (role IN ('user', 'assistant')),
                content TEXT NOT NULL,
                citations JSON NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_messages_session
                ON messages(session_id, created_at);
            CREATE TABLE IF NOT EXISTS user_usage (
                user_id TEXT PRIMARY KEY,
                messages_used INTEGER NOT NULL DEFAULT 0,
                is_premium INTEGER NOT NULL DEFAULT 0,
                premium_expires_at TEXT
            );",
        )
        .context("Failed to create tables")
        .map_err(storage_err)?;

        Ok(())
    }

    /// Mark an owner as premium until the given time
    ///
    /// Backs `askgenie usage --grant-premium` for local installs.
    pub fn set_premium(&self, owner_id: &str, expires_at: Option<DateTime<Utc>>) -> Result<()> {
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO user_usage (user_id, messages_used, is_premium, premium_expires_at)
            VALUES (?1, 0, 1, ?2)
            ON CONFLICT(user_id) DO UPDATE SET is_premium = 1, premium_expires_at = ?2",
            params![owner_id, expires_at.map(timestamp)],
        )
        .context("Failed to update premium flag")
        .map_err(storage_err)?;
        Ok(())
    }
}

#[async_trait]
impl Persistence for SqlitePersistence {
    async fn insert_session(&self, owner_id: &str, title: &str) -> Result<Session> {
        let conn = self.open()?;
        let now = Utc::now().trunc_subsecs(6);
        let session = Session {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            title: title.to_string(),
            created_at: now,
            updated_at: now,
        };

        conn.execute(
            "INSERT INTO chat_sessions (id, user_id, title, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)",
            params![
                session.id,
                session.owner_id,
                session.title,
                timestamp(now),
                timestamp(now)
            ],
        )
        .context("Failed to insert session")
        .map_err(storage_err)?;

        Ok(session)
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        let conn = self.open()?;
        conn.query_row(
            "SELECT id, user_id, title, created_at, updated_at
            FROM chat_sessions WHERE id = ?",
            params![session_id],
            session_from_row,
        )
        .optional()
        .context("Failed to query session")
        .map_err(|e| storage_err(e).into())
    }

    async fn list_sessions(&self, owner_id: &str, limit: usize) -> Result<Vec<Session>> {
        let conn = self.open()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, user_id, title, created_at, updated_at
                FROM chat_sessions
                WHERE user_id = ?
                ORDER BY created_at DESC, rowid DESC
                LIMIT ?",
            )
            .context("Failed to prepare statement")
            .map_err(storage_err)?;

        let sessions = stmt
            .query_map(params![owner_id, limit as i64], session_from_row)
            .context("Failed to query sessions")
            .map_err(storage_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read session row")
            .map_err(storage_err)?;

        Ok(sessions)
    }

    async fn update_session_title(&self, session_id: &str, title: &str) -> Result<()> {
        let conn = self.open()?;
        let updated = conn
            .execute(
                "UPDATE chat_sessions SET title = ?, updated_at = ? WHERE id = ?",
                params![title, timestamp(Utc::now()), session_id],
            )
            .context("Failed to update session title")
            .map_err(storage_err)?;

        if updated == 0 {
            return Err(GenieError::Storage(format!("Session not found: {}", session_id)).into());
        }
        Ok(())
    }

    async fn insert_message(
        &self,
        session_id: &str,
        owner_id: &str,
        message: &NewMessage,
    ) -> Result<Message> {
        let conn = self.open()?;
        let citations_json = serde_json::to_string(&message.citations)
            .context("Failed to serialize citations")
            .map_err(storage_err)?;

        let stored = Message {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            owner_id: owner_id.to_string(),
            role: message.role,
            content: message.content.clone(),
            citations: message.citations.clone(),
            created_at: Utc::now().trunc_subsecs(6),
        };

        conn.execute(
            "INSERT INTO messages (id, session_id, user_id, role, content, citations, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                stored.id,
                stored.session_id,
                stored.owner_id,
                stored.role.as_str(),
                stored.content,
                citations_json,
                timestamp(stored.created_at)
            ],
        )
        .context("Failed to insert message")
        .map_err(storage_err)?;

        Ok(stored)
    }

    async fn list_messages(&self, session_id: &str) -> Result<Vec<Message>> {
        let conn = self.open()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, session_id, user_id, role, content, citations, created_at
                FROM messages
                WHERE session_id = ?
                ORDER BY created_at ASC, rowid ASC",
            )
            .context("Failed to prepare statement")
            .map_err(storage_err)?;

        let messages = stmt
            .query_map(params![session_id], message_from_row)
            .context("Failed to query messages")
            .map_err(storage_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read message row")
            .map_err(storage_err)?;

        Ok(messages)
    }

    async fn get_usage(&self, owner_id: &str) -> Result<Option<UsageRecord>> {
        let conn = self.open()?;
        conn.query_row(
            "SELECT user_id, messages_used, is_premium, premium_expires_at
            FROM user_usage WHERE user_id = ?",
            params![owner_id],
            |row| {
                let expires: Option<String> = row.get(3)?;
                let premium_expires_at = match expires {
                    Some(raw) => Some(
                        DateTime::parse_from_rfc3339(&raw)
                            .map(|dt| dt.with_timezone(&Utc))
                            .map_err(|e| {
                                rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e))
                            })?,
                    ),
                    None => None,
                };
                Ok(UsageRecord {
                    owner_id: row.get(0)?,
                    messages_used: row.get(1)?,
                    is_premium: row.get(2)?,
                    premium_expires_at,
                })
            },
        )
        .optional()
        .context("Failed to query usage")
        .map_err(|e| storage_err(e).into())
    }

    async fn insert_usage(&self, record: &UsageRecord) -> Result<()> {
        let conn = self.open()?;
        conn.execute(
            "INSERT OR IGNORE INTO user_usage (user_id, messages_used, is_premium, premium_expires_at)
            VALUES (?, ?, ?, ?)",
            params![
                record.owner_id,
                record.messages_used,
                record.is_premium,
                record.premium_expires_at.map(timestamp)
            ],
        )
        .context("Failed to insert usage")
        .map_err(storage_err)?;
        Ok(())
    }

    async fn increment_message_count(&self, owner_id: &str) -> Result<i64> {
        let conn = self.open()?;
        let count: i64 = conn
            .query_row(
                "INSERT INTO user_usage (user_id, messages_used, is_premium)
                VALUES (?, 1, 0)
                ON CONFLICT(user_id) DO UPDATE SET messages_used = messages_used + 1
                RETURNING messages_used",
                params![owner_id],
                |row| row.get(0),
            )
            .context("Failed to increment message count")
            .map_err(storage_err)?;

        tracing::debug!(owner = owner_id, count, "Incremented message count");
        Ok(count)
    }
}
