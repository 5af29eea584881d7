use super::types::{Message, NewMessage, Session, UsageRecord};
use super::Persistence;
use crate::error::{GenieError, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

const SESSIONS: &str = "chat_sessions";
const MESSAGES: &str = "messages";
const USAGE: &str = "user_usage";
const INCREMENT_RPC: &str = "increment_message_count";

/// Persistence backend for a PostgREST-style remote store
///
/// Every call is a single request/response; non-2xx statuses, network
/// errors and undecodable bodies all surface as `GenieError::Transport`.
#[derive(Debug, Clone)]
pub struct RestPersistence {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    access_token: Option<String>,
}

#[derive(Serialize)]
struct SessionInsert<'a> {
    user_id: &'a str,
    title: &'a str,
}

#[derive(Serialize)]
struct TitleUpdate<'a> {
    title: &'a str,
}

#[derive(Serialize)]
struct MessageInsert<'a> {
    session_id: &'a str,
    user_id: &'a str,
    role: &'static str,
    content: &'a str,
    citations: &'a [crate::sources::Citation],
}

#[derive(Serialize)]
struct IncrementArgs<'a> {
    p_user_id: &'a str,
}

impl RestPersistence {
    /// Create a client for the store at `base_url`
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        access_token: Option<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("askgenie/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GenieError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        tracing::info!("Initialized REST persistence: base_url={}", base_url);

        Ok(Self {
            client,
            base_url,
            api_key,
            access_token,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let mut request = request;
        if let Some(key) = &self.api_key {
            request = request.header("apikey", key);
        }
        match self.access_token.as_ref().or(self.api_key.as_ref()) {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, operation: &str) -> Result<Response> {
        let response = self.authorize(request).send().await.map_err(|e| {
            tracing::error!("{} request failed: {}", operation, e);
            GenieError::Transport(format!("{} request failed: {}", operation, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("{} returned error {}: {}", operation, status, error_text);
            return Err(GenieError::Transport(format!(
                "{} returned error {}: {}",
                operation, status, error_text
            ))
            .into());
        }

        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(response: Response, operation: &str) -> Result<T> {
        response.json::<T>().await.map_err(|e| {
            tracing::error!("Failed to parse {} response: {}", operation, e);
            GenieError::Transport(format!("Failed to parse {} response: {}", operation, e)).into()
        })
    }

    async fn insert_returning<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        table: &str,
        body: &B,
        operation: &str,
    ) -> Result<T> {
        let request = self
            .client
            .post(self.table_url(table))
            .header("Prefer", "return=representation")
            .json(body);
        let response = self.send(request, operation).await?;
        let mut rows: Vec<T> = Self::decode(response, operation).await?;
        if rows.is_empty() {
            return Err(
                GenieError::Transport(format!("{} returned no representation", operation)).into(),
            );
        }
        Ok(rows.swap_remove(0))
    }
}

#[async_trait]
impl Persistence for RestPersistence {
    async fn insert_session(&self, owner_id: &str, title: &str) -> Result<Session> {
        self.insert_returning(
            SESSIONS,
            &SessionInsert {
                user_id: owner_id,
                title,
            },
            "insert_session",
        )
        .await
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        let request = self.client.get(self.table_url(SESSIONS)).query(&[
            ("select", "*".to_string()),
            ("id", format!("eq.{}", session_id)),
            ("limit", "1".to_string()),
        ]);
        let response = self.send(request, "get_session").await?;
        let rows: Vec<Session> = Self::decode(response, "get_session").await?;
        Ok(rows.into_iter().next())
    }

    async fn list_sessions(&self, owner_id: &str, limit: usize) -> Result<Vec<Session>> {
        let request = self.client.get(self.table_url(SESSIONS)).query(&[
            ("select", "*".to_string()),
            ("user_id", format!("eq.{}", owner_id)),
            ("order", "created_at.desc".to_string()),
            ("limit", limit.to_string()),
        ]);
        let response = self.send(request, "list_sessions").await?;
        Self::decode(response, "list_sessions").await
    }

    async fn update_session_title(&self, session_id: &str, title: &str) -> Result<()> {
        let request = self
            .client
            .patch(self.table_url(SESSIONS))
            .query(&[("id", format!("eq.{}", session_id))])
            .json(&TitleUpdate { title });
        self.send(request, "update_session_title").await?;
        Ok(())
    }

    async fn insert_message(
        &self,
        session_id: &str,
        owner_id: &str,
        message: &NewMessage,
    ) -> Result<Message> {
        self.insert_returning(
            MESSAGES,
            &MessageInsert {
                session_id,
                user_id: owner_id,
                role: message.role.as_str(),
                content: &message.content,
                citations: &message.citations,
            },
            "insert_message",
        )
        .await
    }

    async fn list_messages(&self, session_id: &str) -> Result<Vec<Message>> {
        let request = self.client.get(self.table_url(MESSAGES)).query(&[
            ("select", "*".to_string()),
            ("session_id", format!("eq.{}", session_id)),
            ("order", "created_at.asc".to_string()),
        ]);
        let response = self.send(request, "list_messages").await?;
        Self::decode(response, "list_messages").await
    }

    async fn get_usage(&self, owner_id: &str) -> Result<Option<UsageRecord>> {
        let request = self.client.get(self.table_url(USAGE)).query(&[
            ("select", "*".to_string()),
            ("user_id", format!("eq.{}", owner_id)),
            ("limit", "1".to_string()),
        ]);
        let response = self.send(request, "get_usage").await?;
        let rows: Vec<UsageRecord> = Self::decode(response, "get_usage").await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_usage(&self, record: &UsageRecord) -> Result<()> {
        let request = self
            .client
            .post(self.table_url(USAGE))
            .header("Prefer", "resolution=ignore-duplicates")
            .json(record);
        self.send(request, "insert_usage").await?;
        Ok(())
    }

    async fn increment_message_count(&self, owner_id: &str) -> Result<i64> {
        let request = self
            .client
            .post(format!("{}/rest/v1/rpc/{}", self.base_url, INCREMENT_RPC))
            .json(&IncrementArgs { p_user_id: owner_id });
        let response = self.send(request, INCREMENT_RPC).await?;
        let count: i64 = Self::decode(response, INCREMENT_RPC).await?;
        tracing::debug!(owner = owner_id, count, "Incremented message count");
        Ok(count)
    }
}
