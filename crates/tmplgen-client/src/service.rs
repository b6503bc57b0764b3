//! The artifact service abstraction
//!
//! The reconciliation engine only ever talks to the backend through this
//! trait, so tests can substitute a scripted implementation.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::types::{ArtifactStatus, GenerateRequest, TemplateStatus};

/// Operations offered by the generation backend
///
/// Every call takes a cancellation token. Cancelling it aborts the request in
/// flight and makes the call return [`crate::ClientError::Cancelled`].
#[async_trait]
pub trait ArtifactService: Send + Sync {
    /// Render a template and write the artifact at `request.target`
    ///
    /// # Errors
    ///
    /// Returns `Backend` for non-success statuses and `Transport`/`Decode`
    /// for network or payload failures.
    async fn generate(
        &self,
        request: &GenerateRequest,
        cancel: &CancellationToken,
    ) -> Result<ArtifactStatus>;

    /// Fetch the fingerprint and generation of the artifact at `target`
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the backend reports the artifact absent.
    async fn get_status(&self, target: &str, cancel: &CancellationToken)
    -> Result<ArtifactStatus>;

    /// Fetch the status of a remote template
    ///
    /// An absent template yields `Ok` with `exists == false`.
    async fn get_template_status(
        &self,
        template_path: &str,
        cancel: &CancellationToken,
    ) -> Result<TemplateStatus>;

    /// Remove the artifact at `target`
    async fn delete(&self, target: &str, cancel: &CancellationToken) -> Result<()>;
}
