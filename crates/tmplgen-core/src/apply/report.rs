//! Reports produced by the apply driver

use serde::Serialize;

use crate::engine::Action;

/// The action taken (or planned) for one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceChange {
    pub name: String,
    pub target: String,
    #[serde(flatten)]
    pub action: Action,
}

/// Preview of what `apply` would do
#[derive(Debug, Clone, Default, Serialize)]
pub struct Plan {
    /// One entry per resource that is declared or tracked
    pub changes: Vec<ResourceChange>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl Plan {
    /// Whether applying would change anything at the backend
    pub fn has_changes(&self) -> bool {
        self.changes.iter().any(|c| c.action.is_change())
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Report from apply, refresh, destroy, or import
#[derive(Debug, Clone, Serialize)]
pub struct ApplyReport {
    /// Whether every resource succeeded
    pub success: bool,
    /// Actions taken
    pub changes: Vec<ResourceChange>,
    /// Non-fatal conditions, prefixed with the resource name
    pub warnings: Vec<String>,
    /// Failures, prefixed with the resource name
    pub errors: Vec<String>,
}

impl Default for ApplyReport {
    fn default() -> Self {
        Self::success()
    }
}

impl ApplyReport {
    /// Create an empty successful report
    pub fn success() -> Self {
        Self {
            success: true,
            changes: Vec::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub(crate) fn record_error(&mut self, name: &str, error: impl std::fmt::Display) {
        self.success = false;
        self.errors.push(format!("{}: {}", name, error));
    }
}
