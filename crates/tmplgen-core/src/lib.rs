//! Reconciliation engine for generated template artifacts
//!
//! This crate decides, on every cycle, whether an artifact rendered by the
//! generation backend must be (re)generated, moved, or left alone, and keeps
//! the persisted state of each managed artifact:
//!
//! - **Resource model**: declared inputs and observed outputs
//! - **Engine**: the pure update decision plus the [`Reconciler`]
//! - **Lifecycle**: the create/read/update/delete/import interface hosts call
//! - **Ledger**: TOML state file with file locking
//! - **Configuration**: `tmplgen.toml` manifest with local overrides
//! - **ApplyEngine**: concurrent plan/apply/refresh/destroy/import
//!
//! # Architecture
//!
//! ```text
//!                  tmplgen-cli
//!                       |
//!     config --> ApplyEngine --> ledger
//!                       |
//!              Lifecycle (Reconciler)
//!                       |
//!              tmplgen-client (ArtifactService)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tmplgen_core::{DeclaredInput, Lifecycle, Reconciler};
//!
//! let reconciler = Reconciler::new(Arc::new(client));
//! let input = DeclaredInput::remote("gs://t/a.tpl", "gs://o/a.yaml", r#"{"x":1}"#);
//! let applied = reconciler.create(&input, &cancel).await?;
//! assert_eq!(applied.state.id, "gs://o/a.yaml");
//! ```

pub mod apply;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod resource;

pub use apply::{ApplyEngine, ApplyReport, HttpServiceFactory, Plan, ResourceChange, ServiceFactory};
pub use config::{ConfigResolver, Manifest, ResolvedConfig};
pub use diagnostics::{Diagnostics, Warning};
pub use engine::{
    Action, Applied, ReadOutcome, Reconciler, RegenerateReason, TemplateObservation,
    decide_update,
};
pub use error::{Error, Operation, Result, ValidationError};
pub use ledger::{LedgerEntry, StateLedger};
pub use lifecycle::Lifecycle;
pub use resource::{Connection, DeclaredInput, ObservedOutput, ResourceState, TemplateSource};

pub use tokio_util::sync::CancellationToken;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn error_config_not_found_displays_correctly() {
        let path = PathBuf::from("/path/to/tmplgen.toml");
        let error = Error::ConfigNotFound { path };

        let display = format!("{}", error);
        assert!(
            display.contains("/path/to/tmplgen.toml"),
            "Error display should contain the path, got: {}",
            display
        );
    }
}
