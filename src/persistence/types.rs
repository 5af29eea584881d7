use crate::sources::Citation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A conversation session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Server-assigned identifier
    pub id: String,
    /// Owning identity
    #[serde(rename = "user_id")]
    pub owner_id: String,
    /// Display title
    pub title: String,
    /// When the session was created
    pub created_at: DateTime<Utc>,
    /// When the session was last updated
    pub updated_at: DateTime<Utc>,
}

/// Author of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The person asking
    User,
    /// The answer service
    Assistant,
}

impl Role {
    /// Wire name of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Parse a stored role name
    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Server-assigned identifier
    pub id: String,
    /// Session the turn belongs to
    pub session_id: String,
    /// Owning identity
    #[serde(rename = "user_id")]
    pub owner_id: String,
    /// Author
    pub role: Role,
    /// Text content
    pub content: String,
    /// Citations, empty for user turns
    #[serde(default)]
    pub citations: Vec<Citation>,
    /// Server-assigned creation time
    pub created_at: DateTime<Utc>,
}

/// A turn that has not been stored (yet)
///
/// This is the only shape the persistence layer accepts for writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    /// Author
    pub role: Role,
    /// Text content
    pub content: String,
    /// Citations, empty for user turns
    #[serde(default)]
    pub citations: Vec<Citation>,
}

impl NewMessage {
    /// A user turn (never carries citations)
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            citations: Vec::new(),
        }
    }

    /// An assistant turn
    pub fn assistant(content: impl Into<String>, citations: Vec<Citation>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            citations,
        }
    }
}

impl From<Message> for NewMessage {
    fn from(message: Message) -> Self {
        Self {
            role: message.role,
            content: message.content,
            citations: message.citations,
        }
    }
}

/// Per-owner usage counters and tier flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Owning identity
    #[serde(rename = "user_id")]
    pub owner_id: String,
    /// Messages counted so far
    pub messages_used: i64,
    /// Premium tier flag
    #[serde(default)]
    pub is_premium: bool,
    /// End of the premium period, if any
    #[serde(default)]
    pub premium_expires_at: Option<DateTime<Utc>>,
}

impl UsageRecord {
    /// The record created lazily for an owner with no usage yet
    pub fn fresh(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            messages_used: 0,
            is_premium: false,
            premium_expires_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip_names() {
        assert_eq!(Role::parse_str("user"), Some(Role::User));
        assert_eq!(Role::parse_str("assistant"), Some(Role::Assistant));
        assert_eq!(Role::parse_str("system"), None);
        assert_eq!(Role::Assistant.to_string(), "assistant");
    }

    #[test]
    fn test_session_uses_wire_owner_field() {
        let json = serde_json::json!({
            "id": "s1",
            "user_id": "u1",
            "title": "New Chat",
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z"
        });
        let session: Session = serde_json::from_value(json).unwrap();
        assert_eq!(session.owner_id, "u1");
    }

    #[test]
    fn test_message_without_citations_column() {
        let json = serde_json::json!({
            "id": "m1",
            "session_id": "s1",
            "user_id": "u1",
            "role": "user",
            "content": "hi",
            "created_at": "2025-01-01T00:00:00Z"
        });
        let message: Message = serde_json::from_value(json).unwrap();
        assert!(message.citations.is_empty());
        assert_eq!(message.role, Role::User);
    }

    #[test]
    fn test_fresh_usage() {
        let usage = UsageRecord::fresh("u1");
        assert_eq!(usage.messages_used, 0);
        assert!(!usage.is_premium);
    }
}
