//! Answer fetching
//!
//! This module defines the [`AnswerSource`] trait for the answer-generation
//! service, along with the request and answer types shared by its
//! implementations:
//!
//! - [`HttpAnswerFetcher`]: the real HTTP service
//! - [`fake::FakeAnswerSource`]: scripted replies for tests
//!
//! Every failure (non-2xx status, network error, malformed body) is reported
//! as `GenieError::FetchFailed`. Sources do not retry.

use crate::error::Result;
use crate::sources::Citation;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod fake;
pub mod http;

pub use http::HttpAnswerFetcher;

/// Body of an answer request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRequest {
    /// The user's question, already trimmed
    pub question: String,
    /// Ask the service to include video results
    pub include_video: bool,
}

impl AnswerRequest {
    /// Create a request that includes video results
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            include_video: true,
        }
    }
}

/// A generated answer with normalized citations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    /// Answer text
    pub text: String,
    /// Video citations first, then web citations
    pub citations: Vec<Citation>,
}

/// The answer-generation service
///
/// Implementations are stateless and safe to call concurrently; callers
/// de-duplicate requests.
#[async_trait]
pub trait AnswerSource: Send + Sync {
    /// Ask one question; single request/response, no streaming
    async fn ask(&self, request: &AnswerRequest) -> Result<Answer>;
}
