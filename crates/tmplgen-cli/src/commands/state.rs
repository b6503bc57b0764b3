//! State ledger inspection commands

use colored::Colorize;
use tmplgen_core::StateLedger;

use crate::context::ProjectContext;
use crate::error::{CliError, Result};

/// List tracked resources
pub fn run_state_list(context: &ProjectContext) -> Result<()> {
    let ledger = StateLedger::load_or_default(&context.state_path)?;
    if ledger.is_empty() {
        println!("No resources tracked in {}", context.state_path.display());
        return Ok(());
    }

    for (name, entry) in ledger.iter() {
        let observed = &entry.state.observed;
        println!(
            "{} {} generation={} updated={}",
            name.cyan().bold(),
            entry.state.target(),
            if observed.artifact_generation.is_empty() {
                "-"
            } else {
                observed.artifact_generation.as_str()
            },
            entry.updated_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

/// Show one resource's recorded state as TOML
pub fn run_state_show(context: &ProjectContext, name: &str) -> Result<()> {
    let ledger = StateLedger::load_or_default(&context.state_path)?;
    let entry = ledger
        .get(name)
        .ok_or_else(|| CliError::user(format!("resource '{}' is not tracked", name)))?;

    println!("{}", format!("# {}", name).dimmed());
    print!("{}", toml::to_string_pretty(entry)?);
    Ok(())
}

/// Forget a resource without touching its artifact
pub fn run_state_rm(context: &ProjectContext, name: &str) -> Result<()> {
    let mut ledger = StateLedger::load_or_default(&context.state_path)?;
    let entry = ledger
        .remove(name)
        .ok_or_else(|| CliError::user(format!("resource '{}' is not tracked", name)))?;
    ledger.save(&context.state_path)?;

    println!(
        "{} Stopped tracking {} ({}). The artifact was left in place.",
        "OK".green().bold(),
        name.cyan(),
        entry.state.target()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;
    use tmplgen_core::{DeclaredInput, ResourceState};

    fn seeded(dir: &TempDir) -> ProjectContext {
        let context = ProjectContext {
            manifest_path: dir.path().join("tmplgen.toml"),
            state_path: dir.path().join(".tmplgen").join("state.toml"),
        };
        let mut ledger = StateLedger::new();
        let input = DeclaredInput::remote("gs://t/a.j2", "gs://o/a.py", "{}");
        ledger.upsert(
            "a",
            ResourceState {
                id: input.target.clone(),
                input,
                observed: Default::default(),
            },
        );
        ledger.save(&context.state_path).unwrap();
        context
    }

    #[test]
    fn rm_forgets_resource() {
        let dir = TempDir::new().unwrap();
        let context = seeded(&dir);

        run_state_rm(&context, "a").unwrap();

        let ledger = StateLedger::load(&context.state_path).unwrap();
        assert!(ledger.is_empty());
    }

    #[test]
    fn rm_unknown_resource_fails() {
        let dir = TempDir::new().unwrap();
        let context = seeded(&dir);

        let err = run_state_rm(&context, "ghost").unwrap_err();
        assert_eq!(err.to_string(), "resource 'ghost' is not tracked");
    }

    #[test]
    fn list_and_show_work_on_missing_ledger() {
        let dir = TempDir::new().unwrap();
        let context = ProjectContext {
            manifest_path: PathBuf::from("tmplgen.toml"),
            state_path: dir.path().join("none.toml"),
        };
        assert!(run_state_list(&context).is_ok());
        assert!(run_state_show(&context, "a").is_err());
    }
}
