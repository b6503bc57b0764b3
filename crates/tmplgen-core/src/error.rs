//! Error types for tmplgen-core

use std::fmt;
use std::path::PathBuf;

use tmplgen_client::ClientError;

/// Result type for tmplgen-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Declared input that breaks the resource invariants
///
/// Always raised before any backend call is made.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Exactly one of `template_path` or `template_content` must be specified; neither was set")]
    TemplateSourceMissing,

    #[error("Exactly one of `template_path` or `template_content` must be specified; both were set")]
    TemplateSourceConflict,

    #[error("`target` must be specified")]
    TargetMissing,
}

/// The lifecycle step that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    Plan,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Plan => "plan",
        };
        f.write_str(name)
    }
}

/// Errors that can occur in tmplgen-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Declared input rejected before contacting the backend
    #[error("Invalid configuration: {0}")]
    Validation(#[from] ValidationError),

    /// A backend call on the critical path failed
    #[error("{operation} failed for {target}: {source}")]
    Operation {
        operation: Operation,
        target: String,
        source: ClientError,
    },

    /// Manifest content that cannot be turned into declared inputs
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Manifest file not found at expected path
    #[error("Configuration not found at {path}")]
    ConfigNotFound { path: PathBuf },

    /// Error in state ledger operations
    #[error("Ledger error: {message}")]
    Ledger { message: String },

    /// Resource name not present in the ledger
    #[error("Resource not tracked: {name}")]
    ResourceNotFound { name: String },

    /// A reconciliation task panicked or was aborted
    #[error("Reconciliation did not complete: {message}")]
    TaskFailed { message: String },

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// TOML deserialization error
    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),

    /// TOML serialization error
    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),
}

impl Error {
    pub(crate) fn operation(operation: Operation, target: &str, source: ClientError) -> Self {
        Self::Operation {
            operation,
            target: target.to_string(),
            source,
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether the failure was caused by cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Operation {
                source: ClientError::Cancelled,
                ..
            }
        )
    }
}
