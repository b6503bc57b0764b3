//! Validate command implementation

use colored::Colorize;
use tmplgen_core::ConfigResolver;

use crate::context::ProjectContext;
use crate::error::{CliError, Result};

/// Run the validate command
///
/// Resolves the manifest and checks every declared input offline.
pub fn run_validate(context: &ProjectContext) -> Result<()> {
    let resolver = ConfigResolver::new(&context.manifest_path);
    println!(
        "{} Validating {}",
        "=>".blue().bold(),
        context.manifest_path.display()
    );
    if resolver.has_local_overrides() {
        println!(
            "   {} with local overrides from {}",
            "+".dimmed(),
            resolver.local_path().display()
        );
    }

    let config = resolver.resolve()?;
    let mut invalid = 0;
    for (name, input) in &config.resources {
        match input.validate() {
            Ok(()) => println!("   {} {} -> {}", "ok".green(), name.cyan(), input.target),
            Err(e) => {
                invalid += 1;
                println!("   {} {}: {}", "invalid".red(), name.cyan(), e);
            }
        }
    }

    if invalid > 0 {
        return Err(CliError::user(format!(
            "{} of {} resource(s) are invalid",
            invalid,
            config.resources.len()
        )));
    }

    println!(
        "{} {} resource(s) valid.",
        "OK".green().bold(),
        config.resources.len()
    );
    Ok(())
}
