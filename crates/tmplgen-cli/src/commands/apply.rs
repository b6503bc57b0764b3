//! Apply and refresh command implementations
//!
//! Both save the ledger even when some resources fail, so successful
//! resources are never forgotten.

use colored::Colorize;
use tmplgen_core::{CancellationToken, ConfigResolver, StateLedger};

use super::{finish_report, http_engine, manifest_timeout, optional_manifest};
use crate::context::ProjectContext;
use crate::error::Result;

/// Run the apply command
pub async fn run_apply(
    context: &ProjectContext,
    json: bool,
    parallel: usize,
    cancel: &CancellationToken,
) -> Result<()> {
    let config = ConfigResolver::new(&context.manifest_path).resolve()?;
    let mut ledger = StateLedger::load_or_default(&context.state_path)?;
    if !json {
        println!(
            "{} Applying {} resource(s)...",
            "=>".blue().bold(),
            config.resources.len()
        );
    }

    let report = http_engine(config.timeout, parallel)
        .apply(&config, &mut ledger, cancel)
        .await;
    ledger.save(&context.state_path)?;

    finish_report("apply", &report, json)
}

/// Run the refresh command
pub async fn run_refresh(
    context: &ProjectContext,
    json: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    let manifest = optional_manifest(context)?;
    let mut ledger = StateLedger::load_or_default(&context.state_path)?;
    if !json {
        println!(
            "{} Refreshing {} tracked resource(s)...",
            "=>".blue().bold(),
            ledger.len()
        );
    }

    let report = http_engine(
        manifest_timeout(manifest.as_ref()),
        tmplgen_core::apply::DEFAULT_MAX_PARALLEL,
    )
    .refresh(&mut ledger, cancel)
    .await;
    ledger.save(&context.state_path)?;

    finish_report("refresh", &report, json)
}
