//! Client for the template artifact generation backend
//!
//! The backend renders templates and stores the resulting artifacts. This
//! crate exposes its four operations through the [`ArtifactService`] trait
//! and provides [`HttpArtifactService`], the reqwest-based implementation:
//!
//! - **generate**: render a template into an artifact at a target location
//! - **get_status**: fingerprint and generation of an existing artifact
//! - **get_template_status**: fingerprint of a remote template
//! - **delete**: remove an artifact
//!
//! Authentication is optional. With [`AuthMode::ServiceAccount`] a token
//! source is resolved once at construction (see [`auth`]).
//!
//! # Example
//!
//! ```ignore
//! use tmplgen_client::{ArtifactService, AuthMode, ClientConfig, HttpArtifactService};
//! use tokio_util::sync::CancellationToken;
//!
//! let client = HttpArtifactService::new(&ClientConfig::new(
//!     "https://generator.example.com",
//!     AuthMode::ServiceAccount,
//! ))?;
//! let status = client.get_status("gs://dags/orders.py", &CancellationToken::new()).await?;
//! println!("{} @ {}", status.checksum, status.generation);
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod service;
pub mod types;

pub use auth::{StaticTokenSource, TokenKind, TokenSource};
pub use config::{AuthMode, ClientConfig};
pub use error::{AuthError, ClientError, Result};
pub use http::HttpArtifactService;
pub use service::ArtifactService;
pub use types::{ArtifactStatus, GenerateRequest, TemplateStatus};

pub use tokio_util::sync::CancellationToken;
