//! Connection settings for the backend client

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default whole-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default TCP connect timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// How requests to the backend are authenticated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// Send requests without credentials
    #[default]
    None,
    /// Attach a bearer token minted from the machine's service account
    ServiceAccount,
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMode::None => write!(f, "none"),
            AuthMode::ServiceAccount => write!(f, "service_account"),
        }
    }
}

impl FromStr for AuthMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "" => Ok(AuthMode::None),
            "service_account" | "service-account" => Ok(AuthMode::ServiceAccount),
            other => Err(format!(
                "unknown auth mode '{}' (expected 'none' or 'service_account')",
                other
            )),
        }
    }
}

/// Settings used to build an [`crate::HttpArtifactService`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the backend, e.g. `https://generator.example.com`
    pub endpoint: String,
    /// Authentication mode
    pub auth: AuthMode,
    /// Upper bound on a single request, body included
    pub timeout: Duration,
    /// Upper bound on establishing the connection
    pub connect_timeout: Duration,
}

impl ClientConfig {
    /// Create a configuration with default timeouts
    pub fn new(endpoint: impl Into<String>, auth: AuthMode) -> Self {
        Self {
            endpoint: endpoint.into(),
            auth,
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Override the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
