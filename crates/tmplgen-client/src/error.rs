//! Error types for tmplgen-client

use std::path::PathBuf;

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors returned by artifact service calls
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The backend reported the artifact absent (HTTP 404)
    #[error("Artifact not found: {target}")]
    NotFound { target: String },

    /// The backend answered with a non-success status
    #[error("Backend returned status {status}: {body}")]
    Backend { status: u16, body: String },

    /// Network failure, timeout, or request construction failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// The backend answered with a payload that could not be decoded
    #[error("Invalid response payload: {0}")]
    Decode(String),

    /// Bearer credential could not be obtained
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The caller cancelled the request before it completed
    #[error("Request cancelled")]
    Cancelled,

    /// The configured backend endpoint is not a usable URL
    #[error("Invalid backend endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
}

impl ClientError {
    /// Whether this error means the artifact is absent from the backend
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::Decode(error.to_string())
        } else {
            Self::Transport(error.to_string())
        }
    }
}

/// Errors raised while resolving or using a token source
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The discovered credentials cannot produce the requested token kind
    #[error("Unsupported credentials type: {kind}")]
    UnsupportedCredentialType { kind: String },

    /// A credentials file exists but could not be read or parsed
    #[error("Failed to load credentials from {path}: {message}")]
    Credentials { path: PathBuf, message: String },

    /// Signing the token assertion failed
    #[error("Failed to sign token assertion: {0}")]
    Jwt(String),

    /// The token endpoint rejected the request or was unreachable
    #[error("Token exchange failed: {0}")]
    TokenExchange(String),

    /// Service-account auth is enabled but no token source could be resolved
    #[error("No token source available: {0}")]
    Unavailable(String),
}
