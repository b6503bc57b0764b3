//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// tmplgen - Keep generated template artifacts in sync with their inputs
#[derive(Parser, Debug)]
#[command(name = "tmplgen")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the manifest (default: nearest tmplgen.toml)
    #[arg(long, global = true, env = "TMPLGEN_MANIFEST")]
    pub manifest: Option<PathBuf>,

    /// Path to the state ledger (default: .tmplgen/state.toml next to the manifest)
    #[arg(long, global = true, env = "TMPLGEN_STATE")]
    pub state: Option<PathBuf>,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Check the manifest without contacting the backend
    Validate,

    /// Preview what apply would change
    Plan {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Generate, regenerate, and remove artifacts to match the manifest
    ///
    /// Examples:
    ///   tmplgen apply                 # Converge every resource
    ///   tmplgen apply --json          # Machine-readable report
    ///   tmplgen apply -j 8            # Reconcile up to 8 resources at once
    Apply {
        /// Output as JSON for CI/CD integration
        #[arg(long)]
        json: bool,

        /// Resources reconciled concurrently
        #[arg(short = 'j', long, default_value_t = tmplgen_core::apply::DEFAULT_MAX_PARALLEL)]
        parallel: usize,
    },

    /// Re-read tracked artifacts and drop those that no longer exist
    Refresh {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Delete tracked artifacts
    ///
    /// Examples:
    ///   tmplgen destroy               # Delete everything tracked
    ///   tmplgen destroy orders_dag    # Delete one resource
    Destroy {
        /// Resources to delete (default: all)
        names: Vec<String>,
    },

    /// Start tracking an artifact that already exists
    Import {
        /// Resource name to record it under
        name: String,

        /// Location of the existing artifact
        target: String,

        /// Backend endpoint (default: [backend] endpoint from the manifest)
        #[arg(long)]
        endpoint: Option<String>,
    },

    /// Inspect or edit the state ledger
    State {
        #[command(subcommand)]
        action: StateAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// State subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum StateAction {
    /// List tracked resources
    List,

    /// Show the recorded state of a resource
    Show {
        /// Resource name
        name: String,
    },

    /// Stop tracking a resource without deleting its artifact
    Rm {
        /// Resource name
        name: String,
    },
}
