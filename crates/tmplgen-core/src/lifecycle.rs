//! Lifecycle interface invoked by hosts
//!
//! A host (the CLI apply driver, or any other orchestrator) owns persistence
//! and scheduling. It hands the engine prior state and declared input and
//! receives the new state plus any warnings.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::diagnostics::Diagnostics;
use crate::engine::{Applied, ReadOutcome};
use crate::resource::{Connection, DeclaredInput, ResourceState};

/// Create/read/update/delete/import of one managed artifact
#[async_trait]
pub trait Lifecycle: Send + Sync {
    /// Generate a new artifact from `input`
    async fn create(&self, input: &DeclaredInput, cancel: &CancellationToken) -> Result<Applied>;

    /// Refresh observed output; reports `Vanished` when the artifact is gone
    async fn read(&self, prior: &ResourceState, cancel: &CancellationToken) -> Result<ReadOutcome>;

    /// Converge a tracked artifact on `input`
    async fn update(
        &self,
        prior: &ResourceState,
        input: &DeclaredInput,
        cancel: &CancellationToken,
    ) -> Result<Applied>;

    /// Delete the artifact; failure is a hard error
    async fn delete(&self, prior: &ResourceState, cancel: &CancellationToken)
    -> Result<Diagnostics>;

    /// Adopt an existing artifact by identifier
    fn import(&self, id: &str, connection: Connection) -> ResourceState;
}
