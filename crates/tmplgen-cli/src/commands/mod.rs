//! Command implementations for tmplgen-cli

pub mod apply;
pub mod destroy;
pub mod plan;
pub mod state;
pub mod validate;

pub use apply::{run_apply, run_refresh};
pub use destroy::{run_destroy, run_import};
pub use plan::run_plan;
pub use state::{run_state_list, run_state_rm, run_state_show};
pub use validate::run_validate;

use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use tmplgen_client::config::DEFAULT_TIMEOUT;
use tmplgen_core::{
    Action, ApplyEngine, ApplyReport, ConfigResolver, Error, HttpServiceFactory, Manifest,
    ResourceChange,
};

use crate::context::ProjectContext;
use crate::error::{CliError, Result};

/// Build an engine talking HTTP with the given per-request timeout
pub(crate) fn http_engine(timeout: Duration, max_parallel: usize) -> ApplyEngine {
    ApplyEngine::new(Arc::new(HttpServiceFactory::new(timeout))).with_max_parallel(max_parallel)
}

/// The manifest if there is one; commands working from the ledger alone
/// do not require it
pub(crate) fn optional_manifest(context: &ProjectContext) -> Result<Option<Manifest>> {
    match ConfigResolver::new(&context.manifest_path).load_manifest() {
        Ok(manifest) => Ok(Some(manifest)),
        Err(Error::ConfigNotFound { .. }) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Backend timeout from the manifest, if any
pub(crate) fn manifest_timeout(manifest: Option<&Manifest>) -> Duration {
    manifest
        .and_then(|m| m.backend.timeout_secs)
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_TIMEOUT)
}

pub(crate) fn print_change(change: &ResourceChange) {
    let marker = match &change.action {
        Action::Create => "+".green(),
        Action::Remove => "-".red(),
        Action::NoOp => "=".dimmed(),
        Action::Regenerate { .. } | Action::RegenerateAndRelocate { .. } => "~".yellow(),
    };
    println!(
        "   {} {} ({}): {}",
        marker,
        change.name.cyan(),
        change.target.dimmed(),
        change.action
    );
}

pub(crate) fn print_warnings(warnings: &[String]) {
    if warnings.is_empty() {
        return;
    }
    println!();
    println!("{}", "Warnings:".yellow().bold());
    for warning in warnings {
        println!("   {} {}", "!".yellow(), warning);
    }
}

pub(crate) fn print_errors(errors: &[String]) {
    if errors.is_empty() {
        return;
    }
    println!();
    println!("{}", "Errors:".red().bold());
    for error in errors {
        println!("   {} {}", "x".red(), error);
    }
}

/// Print a report and turn failed resources into a non-zero exit
pub(crate) fn finish_report(verb: &str, report: &ApplyReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        let changed: Vec<_> = report
            .changes
            .iter()
            .filter(|c| c.action.is_change())
            .collect();
        if report.success && changed.is_empty() {
            println!("{} Nothing to {}. Everything is up to date.", "OK".green().bold(), verb);
        } else if !report.changes.is_empty() {
            println!("{}", "Changes:".bold());
            for change in &report.changes {
                print_change(change);
            }
        }
        print_warnings(&report.warnings);
        print_errors(&report.errors);
    }

    if report.success {
        Ok(())
    } else {
        Err(CliError::user(format!(
            "{} failed for {} resource(s)",
            verb,
            report.errors.len()
        )))
    }
}
