use super::{Answer, AnswerRequest, AnswerSource};
use crate::config::AnswerConfig;
use crate::error::{GenieError, Result};
use crate::sources::{normalize, RawAnswer};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// HTTP client for the answer-generation service
#[derive(Debug, Clone)]
pub struct HttpAnswerFetcher {
    client: Client,
    endpoint: String,
    include_video: bool,
}

impl HttpAnswerFetcher {
    /// Create a fetcher for the configured endpoint
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    ///
    /// # Examples
    ///
    /// ```
    /// use askgenie::answer::HttpAnswerFetcher;
    /// use askgenie::config::AnswerConfig;
    ///
    /// let fetcher = HttpAnswerFetcher::new(&AnswerConfig::default()).unwrap();
    /// assert!(fetcher.endpoint().ends_with("/ask"));
    /// ```
    pub fn new(config: &AnswerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("askgenie/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GenieError::FetchFailed(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!("Initialized answer fetcher: endpoint={}", config.endpoint);

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            include_video: config.include_video,
        })
    }

    /// The configured `ask` endpoint
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Probe the service's `/health` route, a sibling of the `ask` endpoint
    ///
    /// # Errors
    ///
    /// Returns `GenieError::FetchFailed` if the service is unreachable or unhealthy
    pub async fn health(&self) -> Result<serde_json::Value> {
        let url = Url::parse(&self.endpoint)
            .and_then(|endpoint| endpoint.join("health"))
            .map_err(|e| GenieError::FetchFailed(format!("Invalid endpoint: {}", e)))?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| GenieError::FetchFailed(format!("Health request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GenieError::FetchFailed(format!("Health check returned {}", status)).into());
        }

        Ok(response.json().await.unwrap_or(serde_json::Value::Null))
    }
}

#[async_trait]
impl AnswerSource for HttpAnswerFetcher {
    async fn ask(&self, request: &AnswerRequest) -> Result<Answer> {
        let body = AnswerRequest {
            question: request.question.clone(),
            include_video: request.include_video && self.include_video,
        };

        tracing::debug!(
            "Sending answer request: {} chars, include_video={}",
            body.question.chars().count(),
            body.include_video
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Answer request failed: {}", e);
                GenieError::FetchFailed(format!("Answer request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Answer service returned error {}: {}", status, error_text);
            return Err(GenieError::FetchFailed(format!(
                "Answer service returned error {}: {}",
                status, error_text
            ))
            .into());
        }

        let raw: RawAnswer = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse answer response: {}", e);
            GenieError::FetchFailed(format!("Failed to parse answer response: {}", e))
        })?;

        tracing::debug!(
            "Answer received: {} video results, {} source urls",
            raw.video_results.len(),
            raw.source_urls.len()
        );

        Ok(Answer {
            citations: normalize(&raw),
            text: raw.answer,
        })
    }
}
