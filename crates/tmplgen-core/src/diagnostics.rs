//! Non-fatal conditions reported alongside a successful result

use std::fmt;

use serde::{Deserialize, Serialize};

/// A condition the operation recovered from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub summary: String,
    pub detail: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.summary, self.detail)
    }
}

/// Warnings collected during one lifecycle operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning and log it
    pub fn warn(&mut self, summary: impl Into<String>, detail: impl Into<String>) {
        let warning = Warning {
            summary: summary.into(),
            detail: detail.into(),
        };
        tracing::warn!(summary = %warning.summary, "{}", warning.detail);
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    /// Append the warnings of a later step
    pub fn extend(&mut self, other: Diagnostics) {
        self.warnings.extend(other.warnings);
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }
}
