//! Destroy and import command implementations

use colored::Colorize;
use tmplgen_client::AuthMode;
use tmplgen_core::{CancellationToken, Connection, StateLedger};

use super::{finish_report, http_engine, manifest_timeout, optional_manifest, print_warnings};
use crate::context::ProjectContext;
use crate::error::{CliError, Result};

/// Run the destroy command
///
/// Deletes the named artifacts, or every tracked one when `names` is empty.
pub async fn run_destroy(
    context: &ProjectContext,
    names: &[String],
    cancel: &CancellationToken,
) -> Result<()> {
    let manifest = optional_manifest(context)?;
    let mut ledger = StateLedger::load_or_default(&context.state_path)?;
    if ledger.is_empty() {
        println!("{} Nothing is tracked.", "OK".green().bold());
        return Ok(());
    }

    println!("{} Destroying artifacts...", "=>".blue().bold());
    let report = http_engine(
        manifest_timeout(manifest.as_ref()),
        tmplgen_core::apply::DEFAULT_MAX_PARALLEL,
    )
    .destroy(&mut ledger, names, cancel)
    .await?;
    ledger.save(&context.state_path)?;

    finish_report("destroy", &report, false)
}

/// Run the import command
///
/// The endpoint comes from `--endpoint` or the manifest's `[backend]`
/// section; authentication follows the manifest.
pub async fn run_import(
    context: &ProjectContext,
    name: &str,
    target: &str,
    endpoint: Option<&str>,
    cancel: &CancellationToken,
) -> Result<()> {
    let manifest = optional_manifest(context)?;
    let backend = manifest.as_ref().map(|m| &m.backend);

    let endpoint = endpoint
        .map(str::to_string)
        .or_else(|| backend.and_then(|b| b.endpoint.clone()))
        .ok_or_else(|| {
            CliError::user("no endpoint: pass --endpoint or set [backend] endpoint in the manifest")
        })?;
    let auth = backend.and_then(|b| b.auth).unwrap_or(AuthMode::None);

    let mut ledger = StateLedger::load_or_default(&context.state_path)?;
    let report = http_engine(
        manifest_timeout(manifest.as_ref()),
        tmplgen_core::apply::DEFAULT_MAX_PARALLEL,
    )
    .import(
        &mut ledger,
        name,
        target,
        Connection::new(endpoint, auth),
        cancel,
    )
    .await?;
    ledger.save(&context.state_path)?;

    println!(
        "{} Imported {} ({})",
        "OK".green().bold(),
        name.cyan(),
        target
    );
    print_warnings(&report.warnings);
    Ok(())
}
