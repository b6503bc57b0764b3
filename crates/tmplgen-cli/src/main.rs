//! tmplgen CLI
//!
//! Declares generated template artifacts in `tmplgen.toml` and keeps the
//! generation backend in sync with them.

mod cli;
mod commands;
mod context;
mod error;

use std::io;

use clap::{CommandFactory, Parser};
use colored::Colorize;
use tmplgen_core::CancellationToken;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, StateAction};
use context::ProjectContext;
use error::Result;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let Some(command) = cli.command else {
        println!("{} Generated artifact reconciler", "tmplgen".green().bold());
        println!();
        println!("Run {} for available commands.", "tmplgen --help".cyan());
        return Ok(());
    };

    if let Commands::Completions { shell } = command {
        clap_complete::generate(shell, &mut Cli::command(), "tmplgen", &mut io::stdout());
        return Ok(());
    }

    let context = ProjectContext::detect(cli.manifest, cli.state, &std::env::current_dir()?);
    tracing::debug!(
        manifest = %context.manifest_path.display(),
        state = %context.state_path.display(),
        "Resolved project paths"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(execute_command(command, &context))
}

/// Log to stderr; `RUST_LOG` wins over `--verbose`
fn init_tracing(verbose: bool) {
    let default = if verbose {
        "tmplgen=debug,tmplgen_core=debug,tmplgen_client=debug"
    } else {
        "tmplgen=warn,tmplgen_core=warn,tmplgen_client=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_writer(io::stderr)
        .try_init();
    tracing::debug!("Verbose mode enabled");
}

async fn execute_command(command: Commands, context: &ProjectContext) -> Result<()> {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; cancelling in-flight requests");
            on_interrupt.cancel();
        }
    });

    match command {
        Commands::Validate => commands::run_validate(context),
        Commands::Plan { json } => commands::run_plan(context, json, &cancel).await,
        Commands::Apply { json, parallel } => {
            commands::run_apply(context, json, parallel, &cancel).await
        }
        Commands::Refresh { json } => commands::run_refresh(context, json, &cancel).await,
        Commands::Destroy { names } => commands::run_destroy(context, &names, &cancel).await,
        Commands::Import {
            name,
            target,
            endpoint,
        } => commands::run_import(context, &name, &target, endpoint.as_deref(), &cancel).await,
        Commands::State { action } => match action {
            StateAction::List => commands::run_state_list(context),
            StateAction::Show { name } => commands::run_state_show(context, &name),
            StateAction::Rm { name } => commands::run_state_rm(context, &name),
        },
        Commands::Completions { .. } => Ok(()),
    }
}
