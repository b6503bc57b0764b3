//! Reconciler: drives the artifact service through each lifecycle path

use std::sync::Arc;

use async_trait::async_trait;
use tmplgen_client::{ArtifactService, ClientError};
use tokio_util::sync::CancellationToken;

use crate::diagnostics::Diagnostics;
use crate::error::{Error, Operation, Result};
use crate::lifecycle::Lifecycle;
use crate::resource::{Connection, DeclaredInput, ObservedOutput, ResourceState, TemplateSource};

use super::decision::{Action, TemplateObservation, decide_update};

/// New state produced by create or update
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    pub state: ResourceState,
    pub action: Action,
    pub diagnostics: Diagnostics,
}

/// Result of reading a tracked artifact
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    /// The artifact exists; observed output refreshed
    Present {
        state: ResourceState,
        diagnostics: Diagnostics,
    },
    /// The backend no longer has the artifact; drop the record
    Vanished { diagnostics: Diagnostics },
}

/// Template status probe outcome; only cancellation is fatal
enum Probe {
    Checksum(String),
    Failed(ClientError),
}

/// Reconciliation engine bound to one artifact service
#[derive(Clone)]
pub struct Reconciler {
    service: Arc<dyn ArtifactService>,
}

impl Reconciler {
    pub fn new(service: Arc<dyn ArtifactService>) -> Self {
        Self { service }
    }

    /// Preview what applying `input` would do, without side effects
    ///
    /// With no prior state the answer is [`Action::Create`]. Otherwise the
    /// declared template is probed (a read-only call) and the update
    /// decision is evaluated.
    ///
    /// # Errors
    ///
    /// Returns a validation error for invalid input and an operation error
    /// when cancelled.
    pub async fn plan(
        &self,
        prior: Option<&ResourceState>,
        input: &DeclaredInput,
        cancel: &CancellationToken,
    ) -> Result<(Action, Diagnostics)> {
        let source = input.template_source()?;
        let mut diagnostics = Diagnostics::new();

        let Some(prior) = prior else {
            return Ok((Action::Create, diagnostics));
        };

        let observation = self
            .observe_template(Operation::Plan, input, source, &mut diagnostics, cancel)
            .await?;
        Ok((decide_update(prior, input, source, &observation), diagnostics))
    }

    async fn probe_template(
        &self,
        operation: Operation,
        target: &str,
        template_path: &str,
        cancel: &CancellationToken,
    ) -> Result<Probe> {
        match self.service.get_template_status(template_path, cancel).await {
            Ok(status) => Ok(Probe::Checksum(status.checksum)),
            Err(ClientError::Cancelled) => {
                Err(Error::operation(operation, target, ClientError::Cancelled))
            }
            Err(e) => Ok(Probe::Failed(e)),
        }
    }

    /// Probe the declared template ahead of the update decision
    async fn observe_template(
        &self,
        operation: Operation,
        input: &DeclaredInput,
        source: TemplateSource<'_>,
        diagnostics: &mut Diagnostics,
        cancel: &CancellationToken,
    ) -> Result<TemplateObservation> {
        let Some(path) = source.remote_path() else {
            return Ok(TemplateObservation::NotChecked);
        };

        match self
            .probe_template(operation, &input.target, path, cancel)
            .await?
        {
            Probe::Checksum(checksum) => Ok(TemplateObservation::Fingerprint(checksum)),
            Probe::Failed(e) => {
                diagnostics.warn(
                    "Could not check template status",
                    format!(
                        "Unable to check if template {} has been modified: {}. Proceeding with regeneration.",
                        path, e
                    ),
                );
                Ok(TemplateObservation::Unavailable)
            }
        }
    }

    /// Generate the artifact and capture the template fingerprint used
    async fn generate(
        &self,
        operation: Operation,
        input: &DeclaredInput,
        source: TemplateSource<'_>,
        diagnostics: &mut Diagnostics,
        cancel: &CancellationToken,
    ) -> Result<ObservedOutput> {
        let target = input.target.as_str();
        let status = self
            .service
            .generate(&input.generate_request(source), cancel)
            .await
            .map_err(|e| Error::operation(operation, target, e))?;

        let template_checksum = match source.remote_path() {
            Some(path) => match self.probe_template(operation, target, path, cancel).await? {
                Probe::Checksum(checksum) => checksum,
                Probe::Failed(e) => {
                    diagnostics.warn(
                        "Could not get template status",
                        format!("Unable to get template status for {}: {}", path, e),
                    );
                    String::new()
                }
            },
            None => String::new(),
        };

        Ok(ObservedOutput {
            artifact_checksum: status.checksum,
            artifact_generation: status.generation,
            template_checksum,
        })
    }
}

#[async_trait]
impl Lifecycle for Reconciler {
    async fn create(&self, input: &DeclaredInput, cancel: &CancellationToken) -> Result<Applied> {
        let source = input.template_source()?;
        let mut diagnostics = Diagnostics::new();

        let observed = self
            .generate(Operation::Create, input, source, &mut diagnostics, cancel)
            .await?;
        tracing::info!(
            target_path = %input.target,
            generation = %observed.artifact_generation,
            "Artifact created"
        );

        Ok(Applied {
            state: ResourceState {
                id: input.target.clone(),
                input: input.clone(),
                observed,
            },
            action: Action::Create,
            diagnostics,
        })
    }

    async fn read(&self, prior: &ResourceState, cancel: &CancellationToken) -> Result<ReadOutcome> {
        let target = prior.target();
        let mut diagnostics = Diagnostics::new();

        let status = match self.service.get_status(target, cancel).await {
            Ok(status) => status,
            Err(e) if e.is_not_found() => {
                diagnostics.warn(
                    "File not found",
                    format!(
                        "The artifact at {} no longer exists in the backend and will be removed from the state.",
                        target
                    ),
                );
                tracing::info!(target_path = %target, "Artifact vanished");
                return Ok(ReadOutcome::Vanished { diagnostics });
            }
            Err(e) => return Err(Error::operation(Operation::Read, target, e)),
        };

        let mut state = prior.clone();
        state.id = target.to_string();
        state.observed.artifact_checksum = status.checksum;
        state.observed.artifact_generation = status.generation;

        if let Some(path) = prior.input.remote_template() {
            match self
                .probe_template(Operation::Read, target, path, cancel)
                .await?
            {
                Probe::Checksum(checksum) => state.observed.template_checksum = checksum,
                Probe::Failed(e) => diagnostics.warn(
                    "Could not get template status",
                    format!("Unable to get template status for {}: {}", path, e),
                ),
            }
        }

        Ok(ReadOutcome::Present { state, diagnostics })
    }

    async fn update(
        &self,
        prior: &ResourceState,
        input: &DeclaredInput,
        cancel: &CancellationToken,
    ) -> Result<Applied> {
        let source = input.template_source()?;
        let mut diagnostics = Diagnostics::new();

        let old_target = prior.target();
        let new_target = input.target.as_str();
        if old_target != new_target && !old_target.is_empty() {
            match self.service.delete(old_target, cancel).await {
                Ok(()) => tracing::info!(
                    from = %old_target,
                    to = %new_target,
                    "Removed artifact at previous target"
                ),
                Err(ClientError::Cancelled) => {
                    return Err(Error::operation(
                        Operation::Update,
                        new_target,
                        ClientError::Cancelled,
                    ));
                }
                Err(e) => diagnostics.warn(
                    "Failed to delete old file",
                    format!("Could not delete old file at {}: {}", old_target, e),
                ),
            }
        }

        let observation = self
            .observe_template(Operation::Update, input, source, &mut diagnostics, cancel)
            .await?;
        let action = decide_update(prior, input, source, &observation);

        let observed = if action.regenerates() {
            let observed = self
                .generate(Operation::Update, input, source, &mut diagnostics, cancel)
                .await?;
            tracing::info!(target_path = %new_target, %action, "Artifact regenerated");
            observed
        } else {
            tracing::debug!(target_path = %new_target, "Artifact up to date");
            prior.observed.clone()
        };

        Ok(Applied {
            state: ResourceState {
                id: new_target.to_string(),
                input: input.clone(),
                observed,
            },
            action,
            diagnostics,
        })
    }

    async fn delete(
        &self,
        prior: &ResourceState,
        cancel: &CancellationToken,
    ) -> Result<Diagnostics> {
        let target = prior.target();
        self.service
            .delete(target, cancel)
            .await
            .map_err(|e| Error::operation(Operation::Delete, target, e))?;
        tracing::info!(target_path = %target, "Artifact deleted");
        Ok(Diagnostics::new())
    }

    fn import(&self, id: &str, connection: Connection) -> ResourceState {
        ResourceState::imported(id, connection)
    }
}
