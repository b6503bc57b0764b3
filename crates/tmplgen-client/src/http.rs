//! reqwest-backed implementation of [`ArtifactService`]

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode, Url};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::auth::{self, TokenSource};
use crate::config::{AuthMode, ClientConfig};
use crate::error::{AuthError, ClientError, Result};
use crate::service::ArtifactService;
use crate::types::{ArtifactStatus, DeleteRequest, GenerateRequest, TemplateStatus};

/// HTTP client for the generation backend
///
/// The token source (if any) is resolved once, when the client is built.
pub struct HttpArtifactService {
    base_url: String,
    http: reqwest::Client,
    auth: AuthMode,
    token_source: Option<Arc<dyn TokenSource>>,
}

impl std::fmt::Debug for HttpArtifactService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpArtifactService")
            .field("base_url", &self.base_url)
            .field("auth", &self.auth)
            .field("has_token_source", &self.token_source.is_some())
            .finish()
    }
}

impl HttpArtifactService {
    /// Build a client, resolving a token source when service-account auth is on
    ///
    /// # Errors
    ///
    /// Returns `InvalidEndpoint` if the endpoint is not an http(s) URL, or
    /// `Transport` if the HTTP client cannot be initialized.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let (base_url, http) = Self::build_transport(config)?;
        let token_source = match config.auth {
            AuthMode::None => None,
            AuthMode::ServiceAccount => auth::resolve_token_source(&base_url, &http),
        };

        Ok(Self {
            base_url,
            http,
            auth: config.auth,
            token_source,
        })
    }

    /// Build a client that authenticates with the given token source
    ///
    /// # Errors
    ///
    /// Same as [`HttpArtifactService::new`].
    pub fn with_token_source(config: &ClientConfig, source: Arc<dyn TokenSource>) -> Result<Self> {
        let (base_url, http) = Self::build_transport(config)?;
        Ok(Self {
            base_url,
            http,
            auth: AuthMode::ServiceAccount,
            token_source: Some(source),
        })
    }

    /// The normalized base URL (no trailing slash)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_transport(config: &ClientConfig) -> Result<(String, reqwest::Client)> {
        let base_url = normalize_endpoint(&config.endpoint)?;
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok((base_url, http))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        match (self.auth, &self.token_source) {
            (AuthMode::None, _) => Ok(request),
            (AuthMode::ServiceAccount, Some(source)) => {
                let token = source.token().await?;
                Ok(request.bearer_auth(token.expose_secret()))
            }
            (AuthMode::ServiceAccount, None) => Err(AuthError::Unavailable(
                "service account authentication is enabled but no credentials were found"
                    .to_string(),
            )
            .into()),
        }
    }

    /// Send a request and read the whole body, racing the cancellation token
    async fn call(
        &self,
        request: RequestBuilder,
        cancel: &CancellationToken,
    ) -> Result<(StatusCode, Vec<u8>)> {
        let exchange = async {
            let request = self.authorize(request).await?;
            let response = request.send().await?;
            let status = response.status();
            let body = response.bytes().await?;
            Ok::<_, ClientError>((status, body.to_vec()))
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(ClientError::Cancelled),
            result = exchange => result,
        }
    }
}

#[async_trait]
impl ArtifactService for HttpArtifactService {
    async fn generate(
        &self,
        request: &GenerateRequest,
        cancel: &CancellationToken,
    ) -> Result<ArtifactStatus> {
        tracing::debug!(target_path = %request.target, "POST /generate");
        let builder = self.http.post(self.url("generate")).json(request);
        let (status, body) = self.call(builder, cancel).await?;

        if !status.is_success() {
            return Err(backend_error(status, &body));
        }
        decode(&body)
    }

    async fn get_status(
        &self,
        target: &str,
        cancel: &CancellationToken,
    ) -> Result<ArtifactStatus> {
        tracing::debug!(target_path = %target, "GET /status");
        let builder = self
            .http
            .get(self.url("status"))
            .query(&[("target_gcs_path", target)]);
        let (status, body) = self.call(builder, cancel).await?;

        if status == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound {
                target: target.to_string(),
            });
        }
        if !status.is_success() {
            return Err(backend_error(status, &body));
        }
        decode(&body)
    }

    async fn get_template_status(
        &self,
        template_path: &str,
        cancel: &CancellationToken,
    ) -> Result<TemplateStatus> {
        tracing::debug!(template = %template_path, "GET /template-status");
        let builder = self
            .http
            .get(self.url("template-status"))
            .query(&[("template_gcs_path", template_path)]);
        let (status, body) = self.call(builder, cancel).await?;

        if status == StatusCode::NOT_FOUND {
            return Ok(TemplateStatus::absent());
        }
        if !status.is_success() {
            return Err(backend_error(status, &body));
        }

        let mut template: TemplateStatus = decode(&body)?;
        template.exists = true;
        Ok(template)
    }

    async fn delete(&self, target: &str, cancel: &CancellationToken) -> Result<()> {
        tracing::debug!(target_path = %target, "POST /delete");
        let builder = self.http.post(self.url("delete")).json(&DeleteRequest {
            target_gcs_path: target,
        });
        let (status, body) = self.call(builder, cancel).await?;

        if !status.is_success() {
            return Err(backend_error(status, &body));
        }
        Ok(())
    }
}

/// Validate an endpoint and strip any trailing slash
fn normalize_endpoint(endpoint: &str) -> Result<String> {
    let trimmed = endpoint.trim().trim_end_matches('/');
    let url = Url::parse(trimmed).map_err(|e| ClientError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason: e.to_string(),
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ClientError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }

    Ok(trimmed.to_string())
}

fn backend_error(status: StatusCode, body: &[u8]) -> ClientError {
    ClientError::Backend {
        status: status.as_u16(),
        body: String::from_utf8_lossy(body).trim().to_string(),
    }
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| ClientError::Decode(e.to_string()))
}
