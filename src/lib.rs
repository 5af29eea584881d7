//! askgenie - Web and video answers in your terminal
//!
//! This library provides the conversation core behind the `askgenie` CLI:
//! a quota-gated question flow that calls an answer-generation service,
//! normalizes its sources into citations, and keeps every conversation as a
//! persisted chat session.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `orchestrator`: Question lifecycle and the current conversation view
//! - `quota`: Free-tier usage gate and counter
//! - `sources`: Web/video citation normalization
//! - `answer`: Answer service abstraction and HTTP client
//! - `session`: Chat sessions and message history
//! - `transcript`: In-memory turns of a view
//! - `persistence`: Storage boundary (REST, SQLite, in-memory fake)
//! - `identity`: Signed-in user resolution
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli` / `commands`: Command-line interface
//!
//! # Example
//!
//! ```no_run
//! use askgenie::answer::HttpAnswerFetcher;
//! use askgenie::identity::StaticIdentity;
//! use askgenie::persistence::SqlitePersistence;
//! use askgenie::{ChatOrchestrator, Config};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/config.yaml")?;
//!     config.validate()?;
//!
//!     let orchestrator = ChatOrchestrator::new(
//!         &config,
//!         Arc::new(SqlitePersistence::new()?),
//!         Arc::new(HttpAnswerFetcher::new(&config.answer)?),
//!         Arc::new(StaticIdentity::new(&config.identity.owner_id)),
//!     );
//!     orchestrator.start().await?;
//!     orchestrator.submit("What is the tallest mountain?").await;
//!     Ok(())
//! }
//! ```

pub mod answer;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod identity;
pub mod orchestrator;
pub mod persistence;
pub mod quota;
pub mod session;
pub mod sources;
pub mod transcript;

// Re-export commonly used types
pub use config::Config;
pub use error::{GenieError, Result};
pub use orchestrator::{ChatOrchestrator, SubmitOutcome};
pub use sources::{Citation, CitationKind};
pub use transcript::{Transcript, Turn};
