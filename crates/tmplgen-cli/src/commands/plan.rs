//! Plan command implementation
//!
//! Previews what apply would change. Only template status is queried; no
//! artifact is generated or deleted and the ledger is not written.

use colored::Colorize;
use tmplgen_core::{CancellationToken, ConfigResolver, StateLedger};

use super::{http_engine, print_change, print_errors, print_warnings};
use crate::context::ProjectContext;
use crate::error::{CliError, Result};

/// Run the plan command
pub async fn run_plan(
    context: &ProjectContext,
    json: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    let config = ConfigResolver::new(&context.manifest_path).resolve()?;
    let ledger = StateLedger::load_or_default(&context.state_path)?;
    let engine = http_engine(config.timeout, tmplgen_core::apply::DEFAULT_MAX_PARALLEL);

    let plan = engine.plan(&config, &ledger, cancel).await;

    if json {
        let output = serde_json::json!({
            "has_changes": plan.has_changes(),
            "changes": plan.changes,
            "warnings": plan.warnings,
            "errors": plan.errors,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if !plan.has_changes() && plan.is_ok() {
        println!(
            "{} No changes needed. Artifacts are up to date.",
            "OK".green().bold()
        );
        print_warnings(&plan.warnings);
    } else {
        println!("{}", "Planned changes:".bold());
        for change in &plan.changes {
            print_change(change);
        }
        print_warnings(&plan.warnings);
        print_errors(&plan.errors);
    }

    if plan.is_ok() {
        Ok(())
    } else {
        Err(CliError::user(format!(
            "plan failed for {} resource(s)",
            plan.errors.len()
        )))
    }
}
