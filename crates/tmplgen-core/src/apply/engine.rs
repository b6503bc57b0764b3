//! ApplyEngine implementation
//!
//! The ApplyEngine reconciles a whole manifest against the ledger. Each
//! resource runs as its own task; results are folded into the ledger in name
//! order once every task has finished.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::ResolvedConfig;
use crate::diagnostics::Diagnostics;
use crate::engine::{Action, ReadOutcome, Reconciler};
use crate::ledger::StateLedger;
use crate::lifecycle::Lifecycle;
use crate::resource::{Connection, DeclaredInput, ResourceState};
use crate::{Error, Result};

use super::factory::ServiceFactory;
use super::report::{ApplyReport, Plan, ResourceChange};

/// Default number of resources reconciled at once
pub const DEFAULT_MAX_PARALLEL: usize = 4;

/// Work for one resource
enum Job {
    /// Preview only
    Plan {
        prior: Option<ResourceState>,
        input: DeclaredInput,
    },
    /// Create an untracked resource
    Create(DeclaredInput),
    /// Read a tracked resource, then update it (or recreate if it vanished)
    Converge {
        prior: ResourceState,
        input: DeclaredInput,
    },
    /// Refresh a tracked resource
    Refresh(ResourceState),
    /// Delete a tracked resource
    Delete(ResourceState),
}

impl Job {
    fn connection(&self) -> &Connection {
        match self {
            Job::Plan { input, .. } | Job::Create(input) | Job::Converge { input, .. } => {
                &input.connection
            }
            Job::Refresh(prior) | Job::Delete(prior) => prior.connection(),
        }
    }

    fn target(&self) -> &str {
        match self {
            Job::Plan { input, .. } | Job::Create(input) | Job::Converge { input, .. } => {
                &input.target
            }
            Job::Refresh(prior) | Job::Delete(prior) => prior.target(),
        }
    }

    async fn run(self, reconciler: Reconciler, cancel: CancellationToken) -> Outcome {
        let result = match self {
            Job::Plan { prior, input } => {
                let target = input.target.clone();
                reconciler
                    .plan(prior.as_ref(), &input, &cancel)
                    .await
                    .map(|(action, diagnostics)| Outcome::Planned {
                        target,
                        action,
                        diagnostics,
                    })
            }
            Job::Create(input) => reconciler
                .create(&input, &cancel)
                .await
                .map(|applied| Outcome::Tracked {
                    state: applied.state,
                    action: Some(applied.action),
                    diagnostics: applied.diagnostics,
                }),
            Job::Converge { prior, input } => converge(&reconciler, prior, input, &cancel).await,
            Job::Refresh(prior) => match reconciler.read(&prior, &cancel).await {
                Ok(ReadOutcome::Present { state, diagnostics }) => Ok(Outcome::Tracked {
                    state,
                    action: None,
                    diagnostics,
                }),
                Ok(ReadOutcome::Vanished { diagnostics }) => Ok(Outcome::Dropped {
                    target: prior.target().to_string(),
                    action: None,
                    diagnostics,
                }),
                Err(e) => Err(e),
            },
            Job::Delete(prior) => {
                reconciler
                    .delete(&prior, &cancel)
                    .await
                    .map(|diagnostics| Outcome::Dropped {
                        target: prior.target().to_string(),
                        action: Some(Action::Remove),
                        diagnostics,
                    })
            }
        };
        result.unwrap_or_else(Outcome::Failed)
    }
}

/// Read, then update or recreate
///
/// The declared input is validated before the read so an invalid
/// configuration never reaches the backend. The read refreshes the artifact fingerprint and detects a vanished
/// artifact. The template fingerprint recorded at the last generation is
/// kept for the update decision so template changes are still detected.
async fn converge(
    reconciler: &Reconciler,
    prior: ResourceState,
    input: DeclaredInput,
    cancel: &CancellationToken,
) -> Result<Outcome> {
    input.validate()?;
    let mut diagnostics = Diagnostics::new();
    let refreshed = match reconciler.read(&prior, cancel).await? {
        ReadOutcome::Present {
            mut state,
            diagnostics: read_diagnostics,
        } => {
            diagnostics.extend(read_diagnostics);
            state.observed.template_checksum = prior.observed.template_checksum.clone();
            Some(state)
        }
        ReadOutcome::Vanished {
            diagnostics: read_diagnostics,
        } => {
            diagnostics.extend(read_diagnostics);
            None
        }
    };

    let applied = match refreshed {
        Some(state) => reconciler.update(&state, &input, cancel).await?,
        None => reconciler.create(&input, cancel).await?,
    };
    diagnostics.extend(applied.diagnostics);

    Ok(Outcome::Tracked {
        state: applied.state,
        action: Some(applied.action),
        diagnostics,
    })
}

/// Result of one job
enum Outcome {
    Planned {
        target: String,
        action: Action,
        diagnostics: Diagnostics,
    },
    /// Keep tracking `state`
    Tracked {
        state: ResourceState,
        action: Option<Action>,
        diagnostics: Diagnostics,
    },
    /// Stop tracking the resource
    Dropped {
        target: String,
        action: Option<Action>,
        diagnostics: Diagnostics,
    },
    Failed(Error),
}

/// Drives plan/apply/refresh/destroy/import across many resources
pub struct ApplyEngine {
    factory: Arc<dyn ServiceFactory>,
    max_parallel: usize,
}

impl ApplyEngine {
    pub fn new(factory: Arc<dyn ServiceFactory>) -> Self {
        Self {
            factory,
            max_parallel: DEFAULT_MAX_PARALLEL,
        }
    }

    /// Limit how many resources are reconciled concurrently (at least one)
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }

    /// Preview the changes `apply` would make
    ///
    /// Declared but untracked resources are created, tracked ones go
    /// through the update decision, and tracked but undeclared ones are
    /// removed. The ledger is not modified.
    pub async fn plan(
        &self,
        config: &ResolvedConfig,
        ledger: &StateLedger,
        cancel: &CancellationToken,
    ) -> Plan {
        let mut jobs = Vec::new();
        let mut plan = Plan::default();

        for (name, input) in &config.resources {
            let prior = ledger.get(name).map(|entry| entry.state.clone());
            jobs.push((
                name.clone(),
                Job::Plan {
                    prior,
                    input: input.clone(),
                },
            ));
        }
        for (name, entry) in ledger.iter() {
            if !config.resources.contains_key(name) {
                plan.changes.push(ResourceChange {
                    name: name.to_string(),
                    target: entry.state.target().to_string(),
                    action: Action::Remove,
                });
            }
        }

        for (name, outcome) in self.run_jobs(jobs, cancel).await {
            match outcome {
                Outcome::Planned {
                    target,
                    action,
                    diagnostics,
                } => {
                    push_warnings(&mut plan.warnings, &name, diagnostics);
                    plan.changes.push(ResourceChange {
                        name,
                        target,
                        action,
                    });
                }
                Outcome::Failed(e) => plan.errors.push(format!("{}: {}", name, e)),
                Outcome::Tracked { .. } | Outcome::Dropped { .. } => {}
            }
        }
        plan.changes.sort_by(|a, b| a.name.cmp(&b.name));
        plan
    }

    /// Converge the backend on the declared configuration
    ///
    /// Failures of one resource do not stop the others. The ledger reflects
    /// every resource that succeeded; the caller saves it afterwards.
    pub async fn apply(
        &self,
        config: &ResolvedConfig,
        ledger: &mut StateLedger,
        cancel: &CancellationToken,
    ) -> ApplyReport {
        let mut jobs = Vec::new();
        for (name, input) in &config.resources {
            let job = match ledger.get(name) {
                Some(entry) => Job::Converge {
                    prior: entry.state.clone(),
                    input: input.clone(),
                },
                None => Job::Create(input.clone()),
            };
            jobs.push((name.clone(), job));
        }
        for (name, entry) in ledger.iter() {
            if !config.resources.contains_key(name) {
                jobs.push((name.to_string(), Job::Delete(entry.state.clone())));
            }
        }

        let results = self.run_jobs(jobs, cancel).await;
        fold_into_ledger(results, ledger)
    }

    /// Refresh every tracked resource, dropping those that vanished
    pub async fn refresh(
        &self,
        ledger: &mut StateLedger,
        cancel: &CancellationToken,
    ) -> ApplyReport {
        let jobs = ledger
            .iter()
            .map(|(name, entry)| (name.to_string(), Job::Refresh(entry.state.clone())))
            .collect();
        let results = self.run_jobs(jobs, cancel).await;
        fold_into_ledger(results, ledger)
    }

    /// Delete the named tracked resources, or all of them when `names` is empty
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if a name is not tracked; nothing is
    /// deleted in that case.
    pub async fn destroy(
        &self,
        ledger: &mut StateLedger,
        names: &[String],
        cancel: &CancellationToken,
    ) -> Result<ApplyReport> {
        let selected: Vec<String> = if names.is_empty() {
            ledger.names().map(str::to_string).collect()
        } else {
            if let Some(missing) = names.iter().find(|n| ledger.get(n).is_none()) {
                return Err(Error::ResourceNotFound {
                    name: missing.clone(),
                });
            }
            names.to_vec()
        };

        let jobs = selected
            .into_iter()
            .filter_map(|name| {
                let state = ledger.get(&name)?.state.clone();
                Some((name, Job::Delete(state)))
            })
            .collect();
        let results = self.run_jobs(jobs, cancel).await;
        Ok(fold_into_ledger(results, ledger))
    }

    /// Adopt the artifact at `target` under `name`
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `name` is already tracked or the
    /// artifact does not exist, and an operation error if the read fails.
    pub async fn import(
        &self,
        ledger: &mut StateLedger,
        name: &str,
        target: &str,
        connection: Connection,
        cancel: &CancellationToken,
    ) -> Result<ApplyReport> {
        if ledger.get(name).is_some() {
            return Err(Error::config(format!("resource '{}' is already tracked", name)));
        }

        let reconciler = Reconciler::new(self.factory.service_for(&connection)?);
        let imported = reconciler.import(target, connection);

        match reconciler.read(&imported, cancel).await? {
            ReadOutcome::Present { state, diagnostics } => {
                let mut report = ApplyReport::success();
                push_warnings(&mut report.warnings, name, diagnostics);
                tracing::info!(resource = %name, target_path = %target, "Artifact imported");
                ledger.upsert(name, state);
                Ok(report)
            }
            ReadOutcome::Vanished { .. } => Err(Error::config(format!(
                "cannot import '{}': no artifact exists at {}",
                name, target
            ))),
        }
    }

    /// Run jobs concurrently, bounded by `max_parallel`; results in name order
    async fn run_jobs(
        &self,
        jobs: Vec<(String, Job)>,
        cancel: &CancellationToken,
    ) -> Vec<(String, Outcome)> {
        let semaphore = Arc::new(Semaphore::new(self.max_parallel));
        let mut tasks = JoinSet::new();
        let mut names = HashMap::new();
        let mut results = Vec::with_capacity(jobs.len());

        for (name, job) in jobs {
            let service = match self.factory.service_for(job.connection()) {
                Ok(service) => service,
                Err(e) => {
                    results.push((name, Outcome::Failed(e)));
                    continue;
                }
            };
            tracing::debug!(resource = %name, target_path = %job.target(), "Scheduling");

            let reconciler = Reconciler::new(service);
            let semaphore = semaphore.clone();
            let cancel = cancel.clone();
            let task_name = name.clone();
            let handle = tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let outcome = job.run(reconciler, cancel).await;
                (task_name, outcome)
            });
            names.insert(handle.id(), name);
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((_, result)) => results.push(result),
                Err(e) => {
                    let name = names.remove(&e.id()).unwrap_or_default();
                    tracing::error!(resource = %name, error = %e, "Resource task failed to complete");
                    results.push((
                        name,
                        Outcome::Failed(Error::TaskFailed {
                            message: e.to_string(),
                        }),
                    ));
                }
            }
        }

        results.sort_by(|a, b| a.0.cmp(&b.0));
        results
    }
}

fn push_warnings(warnings: &mut Vec<String>, name: &str, diagnostics: Diagnostics) {
    warnings.extend(
        diagnostics
            .into_warnings()
            .into_iter()
            .map(|w| format!("{}: {}", name, w)),
    );
}

fn fold_into_ledger(results: Vec<(String, Outcome)>, ledger: &mut StateLedger) -> ApplyReport {
    let mut report = ApplyReport::success();

    for (name, outcome) in results {
        match outcome {
            Outcome::Tracked {
                state,
                action,
                diagnostics,
            } => {
                push_warnings(&mut report.warnings, &name, diagnostics);
                if let Some(action) = action {
                    report.changes.push(ResourceChange {
                        name: name.clone(),
                        target: state.target().to_string(),
                        action,
                    });
                }
                ledger.upsert(name, state);
            }
            Outcome::Dropped {
                target,
                action,
                diagnostics,
            } => {
                push_warnings(&mut report.warnings, &name, diagnostics);
                if let Some(action) = action {
                    report.changes.push(ResourceChange {
                        name: name.clone(),
                        target,
                        action,
                    });
                }
                ledger.remove(&name);
            }
            Outcome::Failed(e) => report.record_error(&name, e),
            Outcome::Planned { .. } => {}
        }
    }

    report
}
