//! Error types for AskGenie
//!
//! This module defines all error types used throughout the crate,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for AskGenie operations
///
/// Covers configuration, validation, quota, transport and storage failures.
/// The conversation core never surfaces these to the end user directly;
/// every failure path degrades to a visible transcript state.
#[derive(Error, Debug)]
pub enum GenieError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rejected user input (empty question, unknown session id)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Free-tier policy limit reached
    #[error("Quota denied: used={used}, limit={limit}")]
    QuotaDenied {
        /// Messages already used by the owner
        used: i64,
        /// The configured policy limit
        limit: i64,
    },

    /// Network or service failure talking to a remote collaborator
    #[error("Transport failure: {0}")]
    Transport(String),

    /// The answer-generation service could not produce an answer
    #[error("Answer fetch failed: {0}")]
    FetchFailed(String),

    /// Persistence backend errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// No authenticated identity is available
    #[error("Not authenticated: {0}")]
    Unauthenticated(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for AskGenie operations
///
/// Uses `anyhow::Error` so call sites can attach context; code that must
/// branch on a failure class uses typed outcomes instead of downcasting.
pub type Result<T> = anyhow::Result<T>;
