//! Azure AD authentication
//!
//! OAuth2 client credentials flow for app-only access to a Dataverse
//! environment, with a process-wide cached token.

use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;

/// Authentication errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Token request failed: {0}")]
    TokenRequestFailed(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Token parse error: {0}")]
    ParseError(String),
}

/// Token response from Azure AD
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[allow(dead_code)]
    token_type: String,
    expires_in: u64,
}

/// An acquired bearer token. `expires_at` is strictly in the future when
/// handed out by [`TokenProvider::get_token`].
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: Instant,
}

impl AccessToken {
    fn is_valid(&self) -> bool {
        // Consider token expired 60 seconds before actual expiry
        self.expires_at > Instant::now() + Duration::from_secs(60)
    }
}

/// Acquires and caches a client-credentials token for the Dataverse resource.
///
/// Acquisition is serialized behind an async mutex: concurrent callers that
/// find the cache expired queue on the lock and re-check it once acquired, so
/// at most one token request is in flight at a time.
#[derive(Debug)]
pub struct TokenProvider {
    client_id: String,
    client_secret: String,
    resource: String,
    token_endpoint: String,
    http_client: Client,
    cache: Mutex<Option<AccessToken>>,
}

impl TokenProvider {
    pub fn new(
        tenant_id: String,
        client_id: String,
        client_secret: String,
        resource: String,
    ) -> Self {
        let token_endpoint = format!(
            "https://login.microsoftonline.com/{}/oauth2/v2.0/token",
            tenant_id
        );
        Self {
            client_id,
            client_secret,
            resource,
            token_endpoint,
            http_client: Client::new(),
            cache: Mutex::new(None),
        }
    }

    #[cfg(test)]
    fn with_token_endpoint(mut self, url: String) -> Self {
        self.token_endpoint = url;
        self
    }

    /// Scope for the client-credentials grant: `<resource>/.default`
    fn scope(&self) -> String {
        if self.resource.ends_with('/') {
            format!("{}.default", self.resource)
        } else {
            format!("{}/.default", self.resource)
        }
    }

    /// Return the cached token, refreshing it first if expired.
    ///
    /// A failed refresh leaves the cache untouched and is not retried here.
    pub async fn get_token(&self) -> Result<AccessToken, AuthError> {
        let mut cache = self.cache.lock().await;

        if let Some(ref cached) = *cache {
            if cached.is_valid() {
                tracing::debug!("Using cached token");
                return Ok(cached.clone());
            }
        }

        tracing::info!("Acquiring new access token for resource: {}", self.resource);
        let token = self.acquire_token().await?;
        *cache = Some(token.clone());
        Ok(token)
    }

    /// Acquire a new token from Azure AD
    async fn acquire_token(&self) -> Result<AccessToken, AuthError> {
        let scope = self.scope();
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("scope", &scope),
        ];

        let response = self
            .http_client
            .post(&self.token_endpoint)
            .timeout(Duration::from_secs(120))
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Token request failed: {} - {}", status, body);
            return Err(AuthError::TokenRequestFailed(format!(
                "Status: {}, Body: {}",
                status, body
            )));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::ParseError(format!("Failed to parse token response: {}", e)))?;

        tracing::info!(
            "Token acquired successfully, expires in {} seconds",
            token_response.expires_in
        );

        Ok(AccessToken {
            value: token_response.access_token,
            expires_at: Instant::now() + Duration::from_secs(token_response.expires_in),
        })
    }
}
