//! Application-default credential discovery and the token flows they support

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::cache::TokenCache;
use super::{TokenKind, TokenSource};
use crate::error::AuthError;

/// Environment variable naming an explicit credentials file
pub const CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";

pub(crate) const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime assumed when the token endpoint does not report one
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

/// Service account key as downloaded from the cloud console
#[derive(Clone)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key_id: Option<String>,
    pub private_key: Arc<SecretString>,
    pub token_uri: String,
}

/// User credentials written by `gcloud auth application-default login`
#[derive(Clone)]
pub struct AuthorizedUser {
    pub client_id: String,
    pub client_secret: Arc<SecretString>,
    pub refresh_token: Arc<SecretString>,
    pub token_uri: String,
}

/// Credentials found on this machine
#[derive(Clone)]
pub enum Credentials {
    ServiceAccount(ServiceAccountKey),
    AuthorizedUser(AuthorizedUser),
    /// No credentials file; tokens come from the compute metadata server
    Metadata,
    /// A credentials file of a type this client cannot use
    Other { kind: String },
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Credentials({})", self.kind())
    }
}

#[derive(Deserialize)]
struct RawCredentials {
    #[serde(rename = "type")]
    kind: String,
    client_email: Option<String>,
    private_key_id: Option<String>,
    private_key: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    refresh_token: Option<String>,
    token_uri: Option<String>,
}

impl Credentials {
    /// Short name of the credential type, as used in the credentials file
    pub fn kind(&self) -> &str {
        match self {
            Credentials::ServiceAccount(_) => "service_account",
            Credentials::AuthorizedUser(_) => "authorized_user",
            Credentials::Metadata => "metadata",
            Credentials::Other { kind } => kind,
        }
    }

    /// Discover credentials from the environment and well-known locations
    ///
    /// # Errors
    ///
    /// Returns an error if a credentials file is named or present but
    /// cannot be read.
    pub fn discover() -> Result<Self, AuthError> {
        let explicit = std::env::var_os(CREDENTIALS_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        Self::discover_from(explicit, well_known_path())
    }

    /// Discovery with the candidate paths supplied by the caller
    ///
    /// An explicit path must exist. The well-known path is used only if it
    /// exists; otherwise the metadata server is assumed.
    pub fn discover_from(
        explicit: Option<PathBuf>,
        well_known: Option<PathBuf>,
    ) -> Result<Self, AuthError> {
        if let Some(path) = explicit {
            return Self::from_file(&path);
        }

        match well_known {
            Some(path) if path.is_file() => Self::from_file(&path),
            _ => {
                tracing::debug!("No credentials file found, using metadata server");
                Ok(Credentials::Metadata)
            }
        }
    }

    /// Load credentials from a JSON file
    ///
    /// # Errors
    ///
    /// Returns `Credentials` if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, AuthError> {
        let content = std::fs::read_to_string(path).map_err(|e| AuthError::Credentials {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_json(&content, path)
    }

    /// Parse credentials JSON; `path` is used for error messages only
    pub fn from_json(content: &str, path: &Path) -> Result<Self, AuthError> {
        let invalid = |message: String| AuthError::Credentials {
            path: path.to_path_buf(),
            message,
        };
        let raw: RawCredentials =
            serde_json::from_str(content).map_err(|e| invalid(e.to_string()))?;
        let missing = |field: &str| invalid(format!("missing field '{}'", field));

        match raw.kind.as_str() {
            "service_account" => Ok(Credentials::ServiceAccount(ServiceAccountKey {
                client_email: raw.client_email.ok_or_else(|| missing("client_email"))?,
                private_key_id: raw.private_key_id,
                private_key: Arc::new(SecretString::from(
                    raw.private_key.ok_or_else(|| missing("private_key"))?,
                )),
                token_uri: raw
                    .token_uri
                    .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
            })),
            "authorized_user" => Ok(Credentials::AuthorizedUser(AuthorizedUser {
                client_id: raw.client_id.ok_or_else(|| missing("client_id"))?,
                client_secret: Arc::new(SecretString::from(
                    raw.client_secret.ok_or_else(|| missing("client_secret"))?,
                )),
                refresh_token: Arc::new(SecretString::from(
                    raw.refresh_token.ok_or_else(|| missing("refresh_token"))?,
                )),
                token_uri: raw
                    .token_uri
                    .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
            })),
            other => Ok(Credentials::Other {
                kind: other.to_string(),
            }),
        }
    }
}

/// Where `gcloud` writes application-default credentials
fn well_known_path() -> Option<PathBuf> {
    #[cfg(windows)]
    let base = dirs::config_dir();
    #[cfg(not(windows))]
    let base = dirs::home_dir().map(|home| home.join(".config"));

    base.map(|dir| dir.join("gcloud").join("application_default_credentials.json"))
}

#[derive(Deserialize)]
struct TokenEndpointResponse {
    access_token: Option<String>,
    id_token: Option<String>,
    expires_in: Option<u64>,
}

async fn exchange(
    http: &reqwest::Client,
    token_uri: &str,
    form: &[(&str, &str)],
    kind: TokenKind,
) -> Result<(SecretString, Duration), AuthError> {
    let response = http
        .post(token_uri)
        .form(form)
        .send()
        .await
        .map_err(|e| AuthError::TokenExchange(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AuthError::TokenExchange(format!(
            "token endpoint returned status {}: {}",
            status.as_u16(),
            body.trim()
        )));
    }

    let parsed: TokenEndpointResponse = response
        .json()
        .await
        .map_err(|e| AuthError::TokenExchange(e.to_string()))?;
    let token = match kind {
        TokenKind::Identity => parsed.id_token,
        TokenKind::Access => parsed.access_token,
    }
    .ok_or_else(|| {
        AuthError::TokenExchange(format!("token endpoint returned no {:?} token", kind))
    })?;
    let lifetime = parsed
        .expires_in
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_TOKEN_LIFETIME);

    Ok((SecretString::from(token), lifetime))
}

/// Mints tokens by exchanging a signed service-account assertion
pub struct JwtBearerSource {
    key: ServiceAccountKey,
    kind: TokenKind,
    /// Audience for identity tokens, scope for access tokens
    claim: String,
    http: reqwest::Client,
    cache: TokenCache,
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    sub: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_audience: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<&'a str>,
}

impl JwtBearerSource {
    pub fn identity(key: ServiceAccountKey, audience: &str, http: reqwest::Client) -> Self {
        Self {
            key,
            kind: TokenKind::Identity,
            claim: audience.to_string(),
            http,
            cache: TokenCache::new(),
        }
    }

    pub fn access(key: ServiceAccountKey, scope: &str, http: reqwest::Client) -> Self {
        Self {
            key,
            kind: TokenKind::Access,
            claim: scope.to_string(),
            http,
            cache: TokenCache::new(),
        }
    }

    fn assertion(&self, now: u64) -> Result<String, AuthError> {
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            sub: &self.key.client_email,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + 3600,
            target_audience: (self.kind == TokenKind::Identity).then_some(self.claim.as_str()),
            scope: (self.kind == TokenKind::Access).then_some(self.claim.as_str()),
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();

        let key = EncodingKey::from_rsa_pem(self.key.private_key.expose_secret().as_bytes())
            .map_err(|e| AuthError::Jwt(e.to_string()))?;
        jsonwebtoken::encode(&header, &claims, &key).map_err(|e| AuthError::Jwt(e.to_string()))
    }
}

#[async_trait]
impl TokenSource for JwtBearerSource {
    async fn token(&self) -> Result<SecretString, AuthError> {
        self.cache
            .get_or_fetch(|| async {
                let now = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map_err(|e| AuthError::Jwt(e.to_string()))?
                    .as_secs();
                let assertion = self.assertion(now)?;
                exchange(
                    &self.http,
                    &self.key.token_uri,
                    &[("grant_type", JWT_BEARER_GRANT), ("assertion", &assertion)],
                    self.kind,
                )
                .await
            })
            .await
    }

    fn kind(&self) -> TokenKind {
        self.kind
    }
}

/// Mints access tokens from a user refresh token
pub struct RefreshTokenSource {
    user: AuthorizedUser,
    http: reqwest::Client,
    cache: TokenCache,
}

impl RefreshTokenSource {
    pub fn new(user: AuthorizedUser, http: reqwest::Client) -> Self {
        Self {
            user,
            http,
            cache: TokenCache::new(),
        }
    }
}

#[async_trait]
impl TokenSource for RefreshTokenSource {
    async fn token(&self) -> Result<SecretString, AuthError> {
        self.cache
            .get_or_fetch(|| async {
                exchange(
                    &self.http,
                    &self.user.token_uri,
                    &[
                        ("grant_type", "refresh_token"),
                        ("client_id", self.user.client_id.as_str()),
                        ("client_secret", self.user.client_secret.expose_secret()),
                        ("refresh_token", self.user.refresh_token.expose_secret()),
                    ],
                    TokenKind::Access,
                )
                .await
            })
            .await
    }

    fn kind(&self) -> TokenKind {
        TokenKind::Access
    }
}
