//! Tokens from the compute metadata server

use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::Deserialize;

use super::cache::TokenCache;
use super::{TokenKind, TokenSource};
use crate::error::AuthError;

/// Environment variable overriding the metadata server host
const METADATA_HOST_ENV: &str = "GCE_METADATA_HOST";

const DEFAULT_METADATA_HOST: &str = "metadata.google.internal";

const ACCOUNT_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default";

/// Google identity tokens are valid for one hour
const IDENTITY_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

/// Mints tokens for the instance's default service account
pub struct MetadataSource {
    base_url: String,
    kind: TokenKind,
    audience: Option<String>,
    http: reqwest::Client,
    cache: TokenCache,
}

#[derive(Deserialize)]
struct AccessTokenResponse {
    access_token: String,
    expires_in: Option<u64>,
}

impl MetadataSource {
    /// Identity tokens whose audience is `audience`
    pub fn identity(audience: &str, http: reqwest::Client) -> Self {
        Self {
            base_url: default_base_url(),
            kind: TokenKind::Identity,
            audience: Some(audience.to_string()),
            http,
            cache: TokenCache::new(),
        }
    }

    /// OAuth2 access tokens with the instance's configured scopes
    pub fn access(http: reqwest::Client) -> Self {
        Self {
            base_url: default_base_url(),
            kind: TokenKind::Access,
            audience: None,
            http,
            cache: TokenCache::new(),
        }
    }

    /// Point the source at a different metadata server
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn fetch(&self) -> Result<(SecretString, Duration), AuthError> {
        let request = match (&self.kind, &self.audience) {
            (TokenKind::Identity, Some(audience)) => self
                .http
                .get(format!("{}/identity", self.base_url))
                .query(&[("audience", audience.as_str()), ("format", "full")]),
            _ => self.http.get(format!("{}/token", self.base_url)),
        };

        let response = request
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| AuthError::TokenExchange(format!("metadata server: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::TokenExchange(format!(
                "metadata server returned status {}: {}",
                status.as_u16(),
                body.trim()
            )));
        }

        match self.kind {
            TokenKind::Identity => {
                let token = response
                    .text()
                    .await
                    .map_err(|e| AuthError::TokenExchange(e.to_string()))?;
                Ok((
                    SecretString::from(token.trim().to_string()),
                    IDENTITY_TOKEN_LIFETIME,
                ))
            }
            TokenKind::Access => {
                let parsed: AccessTokenResponse = response
                    .json()
                    .await
                    .map_err(|e| AuthError::TokenExchange(e.to_string()))?;
                let lifetime = Duration::from_secs(parsed.expires_in.unwrap_or(3600));
                Ok((SecretString::from(parsed.access_token), lifetime))
            }
        }
    }
}

#[async_trait]
impl TokenSource for MetadataSource {
    async fn token(&self) -> Result<SecretString, AuthError> {
        self.cache.get_or_fetch(|| self.fetch()).await
    }

    fn kind(&self) -> TokenKind {
        self.kind
    }
}

fn default_base_url() -> String {
    let host = std::env::var(METADATA_HOST_ENV)
        .ok()
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| DEFAULT_METADATA_HOST.to_string());
    format!("http://{}{}", host, ACCOUNT_PATH)
}
