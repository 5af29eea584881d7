//! Identity provider boundary
//!
//! The conversation core only needs an opaque owner id for the signed-in
//! user and a way to sign out. [`RestIdentity`] talks to a hosted auth
//! service; [`StaticIdentity`] serves a fixed owner for local installs.

use crate::error::{GenieError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// The authenticated user
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Identity {
    /// Opaque owner id used as the key of every persisted record
    pub id: String,
    /// Email address, when the provider exposes one
    #[serde(default)]
    pub email: Option<String>,
}

/// Source of the current authenticated identity
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The signed-in user, or `None` when nobody is signed in
    async fn current_user(&self) -> Result<Option<Identity>>;

    /// End the current session
    async fn sign_out(&self) -> Result<()>;
}

/// Fixed identity for local, single-user installs
#[derive(Debug)]
pub struct StaticIdentity {
    identity: Identity,
    signed_in: AtomicBool,
}

impl StaticIdentity {
    /// Create a provider that always reports `owner_id` until signed out
    pub fn new(owner_id: impl Into<String>) -> Self {
        Self {
            identity: Identity {
                id: owner_id.into(),
                email: None,
            },
            signed_in: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn current_user(&self) -> Result<Option<Identity>> {
        if self.signed_in.load(Ordering::SeqCst) {
            Ok(Some(self.identity.clone()))
        } else {
            Ok(None)
        }
    }

    async fn sign_out(&self) -> Result<()> {
        self.signed_in.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Identity backed by a hosted auth service (`/auth/v1/user`)
#[derive(Debug, Clone)]
pub struct RestIdentity {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    access_token: Option<String>,
}

impl RestIdentity {
    /// Create a provider for the auth service at `base_url`
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
            .build()
            .map_err(|e| GenieError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            access_token,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str, token: &str) -> reqwest::RequestBuilder {
        let mut request = self
            .client
            .request(method, format!("{}/auth/v1/{}", self.base_url, path))
            .bearer_auth(token);
        if let Some(key) = &self.api_key {
            request = request.header("apikey", key);
        }
        request
    }
}

#[async_trait]
impl IdentityProvider for RestIdentity {
    async fn current_user(&self) -> Result<Option<Identity>> {
        let Some(token) = &self.access_token else {
            tracing::debug!("No access token configured, no current user");
            return Ok(None);
        };

        let response = self
            .request(reqwest::Method::GET, "user", token)
            .send()
            .await
            .map_err(|e| GenieError::Transport(format!("Identity request failed: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            tracing::info!("Access token rejected by identity provider ({})", status);
            return Ok(None);
        }
        if !status.is_success() {
            return Err(GenieError::Transport(format!(
                "Identity provider returned error {}",
                status
            ))
            .into());
        }

        let identity: Identity = response.json().await.map_err(|e| {
            GenieError::Transport(format!("Failed to parse identity response: {}", e))
        })?;
        Ok(Some(identity))
    }

    async fn sign_out(&self) -> Result<()> {
        let Some(token) = &self.access_token else {
            return Ok(());
        };

        let response = self
            .request(reqwest::Method::POST, "logout", token)
            .send()
            .await
            .map_err(|e| GenieError::Transport(format!("Sign-out request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(GenieError::Transport(format!(
                "Sign-out returned error {}",
                response.status()
            ))
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_identity_sign_out() {
        let identity = StaticIdentity::new("local");
        assert_eq!(identity.current_user().await.unwrap().unwrap().id, "local");

        identity.sign_out().await.unwrap();
        assert!(identity.current_user().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rest_identity_without_token_has_no_user() {
        let identity = RestIdentity::new("https://auth.example.com", None, None).unwrap();
        assert!(identity.current_user().await.unwrap().is_none());
        assert!(identity.sign_out().await.is_ok());
    }
}
