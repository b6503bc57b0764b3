//! Bearer credentials for service-account authentication
//!
//! A [`TokenSource`] is resolved once per client. Resolution prefers an
//! identity token whose audience is the backend endpoint; credentials that
//! cannot mint identity tokens (user credentials from `gcloud auth
//! application-default login`) fall back to an OAuth2 access token.
//!
//! ```text
//! Credentials::discover()
//!     |
//!     +-- service_account key file --> JwtBearerSource (id or access token)
//!     +-- authorized_user file     --> RefreshTokenSource (access token only)
//!     +-- no file                  --> MetadataSource (id or access token)
//! ```

mod cache;
mod credentials;
mod metadata;

pub use cache::TokenCache;
pub use credentials::{
    AuthorizedUser, CREDENTIALS_ENV, Credentials, JwtBearerSource, RefreshTokenSource,
    ServiceAccountKey,
};
pub use metadata::MetadataSource;

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;

use crate::error::AuthError;

/// OAuth2 scope requested when falling back to access tokens
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// The kind of bearer token a source mints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// OpenID Connect identity token bound to an audience
    Identity,
    /// OAuth2 access token bound to a scope
    Access,
}

/// Something that can produce bearer tokens on demand
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Return a valid token, minting a new one if the cached one expired
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] when the token cannot be obtained.
    async fn token(&self) -> Result<SecretString, AuthError>;

    /// Which kind of token this source mints
    fn kind(&self) -> TokenKind;
}

/// A token source that always returns the same token
///
/// Useful when a token is minted out of band, and in tests.
pub struct StaticTokenSource {
    token: SecretString,
    kind: TokenKind,
}

impl StaticTokenSource {
    pub fn new(token: impl Into<String>, kind: TokenKind) -> Self {
        Self {
            token: SecretString::from(token.into()),
            kind,
        }
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn token(&self) -> Result<SecretString, AuthError> {
        use secrecy::ExposeSecret;
        Ok(SecretString::from(self.token.expose_secret().to_owned()))
    }

    fn kind(&self) -> TokenKind {
        self.kind
    }
}

/// Build an identity-token source for `audience`
///
/// # Errors
///
/// Returns `UnsupportedCredentialType` when the credentials cannot mint
/// identity tokens.
pub fn identity_token_source(
    credentials: &Credentials,
    audience: &str,
    http: &reqwest::Client,
) -> Result<Arc<dyn TokenSource>, AuthError> {
    match credentials {
        Credentials::ServiceAccount(key) => Ok(Arc::new(JwtBearerSource::identity(
            key.clone(),
            audience,
            http.clone(),
        ))),
        Credentials::Metadata => Ok(Arc::new(MetadataSource::identity(audience, http.clone()))),
        Credentials::AuthorizedUser(_) => Err(AuthError::UnsupportedCredentialType {
            kind: credentials.kind().to_string(),
        }),
        Credentials::Other { kind } => Err(AuthError::UnsupportedCredentialType {
            kind: kind.clone(),
        }),
    }
}

/// Build an OAuth2 access-token source for `scope`
///
/// # Errors
///
/// Returns `UnsupportedCredentialType` for credential types with no
/// access-token flow.
pub fn access_token_source(
    credentials: &Credentials,
    scope: &str,
    http: &reqwest::Client,
) -> Result<Arc<dyn TokenSource>, AuthError> {
    match credentials {
        Credentials::ServiceAccount(key) => Ok(Arc::new(JwtBearerSource::access(
            key.clone(),
            scope,
            http.clone(),
        ))),
        Credentials::AuthorizedUser(user) => Ok(Arc::new(RefreshTokenSource::new(
            user.clone(),
            http.clone(),
        ))),
        Credentials::Metadata => Ok(Arc::new(MetadataSource::access(http.clone()))),
        Credentials::Other { kind } => Err(AuthError::UnsupportedCredentialType {
            kind: kind.clone(),
        }),
    }
}

/// Discover credentials and resolve a token source for `audience`
///
/// Returns `None` when no source could be resolved; the failure is logged.
pub fn resolve_token_source(
    audience: &str,
    http: &reqwest::Client,
) -> Option<Arc<dyn TokenSource>> {
    match Credentials::discover() {
        Ok(credentials) => resolve_with(&credentials, audience, http),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to initialize authentication");
            None
        }
    }
}

/// Resolve a token source from already-discovered credentials
pub fn resolve_with(
    credentials: &Credentials,
    audience: &str,
    http: &reqwest::Client,
) -> Option<Arc<dyn TokenSource>> {
    match identity_token_source(credentials, audience, http) {
        Ok(source) => {
            tracing::info!(credentials = credentials.kind(), "Using ID token authentication");
            Some(source)
        }
        Err(AuthError::UnsupportedCredentialType { kind }) => {
            tracing::info!(
                credentials = %kind,
                "Using OAuth2 access token fallback (identity tokens unsupported)"
            );
            match access_token_source(credentials, CLOUD_PLATFORM_SCOPE, http) {
                Ok(source) => Some(source),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to initialize authentication");
                    None
                }
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to initialize authentication");
            None
        }
    }
}
