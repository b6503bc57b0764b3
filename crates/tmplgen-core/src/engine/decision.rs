//! The update decision
//!
//! Regeneration is the default. It is skipped only when the stored and freshly
//! observed template fingerprints prove the backend would render the same
//! artifact to the same place.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::resource::{DeclaredInput, ResourceState, TemplateSource};

/// Result of probing the declared template before an update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateObservation {
    /// No probe was made (inline content)
    NotChecked,
    /// The probe failed
    Unavailable,
    /// Checksum reported by the backend; empty when the template is absent
    Fingerprint(String),
}

/// Why an artifact is regenerated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegenerateReason {
    /// Target moved from an empty previous target
    TargetChanged,
    /// Template status could not be fetched
    TemplateStatusUnavailable,
    /// Stored or observed template fingerprint is empty
    FingerprintUnknown,
    /// Template fingerprint differs from the stored one
    TemplateChanged,
    /// Context or inline content differ from the stored ones
    InputsChanged,
}

impl fmt::Display for RegenerateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RegenerateReason::TargetChanged => "target changed",
            RegenerateReason::TemplateStatusUnavailable => "template status unavailable",
            RegenerateReason::FingerprintUnknown => "template fingerprint unknown",
            RegenerateReason::TemplateChanged => "template changed",
            RegenerateReason::InputsChanged => "inputs changed",
        };
        f.write_str(text)
    }
}

/// What a reconciliation cycle does to one artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Generate an artifact that is not tracked yet
    Create,
    /// Carry the observed output forward
    NoOp,
    /// Generate again at the same target
    Regenerate { reason: RegenerateReason },
    /// Delete the artifact at `from`, then generate at the new target
    RegenerateAndRelocate { from: String },
    /// Delete a tracked artifact that is no longer declared
    Remove,
}

impl Action {
    /// Whether the action calls Generate
    pub fn regenerates(&self) -> bool {
        matches!(
            self,
            Action::Create | Action::Regenerate { .. } | Action::RegenerateAndRelocate { .. }
        )
    }

    /// Whether the action changes anything at the backend
    pub fn is_change(&self) -> bool {
        !matches!(self, Action::NoOp)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Create => write!(f, "create"),
            Action::NoOp => write!(f, "no-op"),
            Action::Regenerate { reason } => write!(f, "regenerate ({})", reason),
            Action::RegenerateAndRelocate { from } => {
                write!(f, "regenerate and relocate from {}", from)
            }
            Action::Remove => write!(f, "remove"),
        }
    }
}

/// Decide how an update cycle treats an artifact
///
/// `source` must be the validated template source of `declared`;
/// `observed` is the template probe made for this cycle.
pub fn decide_update(
    prior: &ResourceState,
    declared: &DeclaredInput,
    source: TemplateSource<'_>,
    observed: &TemplateObservation,
) -> Action {
    let old_target = prior.target();
    if declared.target != old_target {
        return if old_target.is_empty() {
            Action::Regenerate {
                reason: RegenerateReason::TargetChanged,
            }
        } else {
            Action::RegenerateAndRelocate {
                from: old_target.to_string(),
            }
        };
    }

    let inputs_unchanged =
        declared.context == prior.input.context && declared.content() == prior.input.content();

    let reason = match source {
        TemplateSource::Remote(_) => match observed {
            TemplateObservation::NotChecked | TemplateObservation::Unavailable => {
                Some(RegenerateReason::TemplateStatusUnavailable)
            }
            TemplateObservation::Fingerprint(current) => {
                let stored = &prior.observed.template_checksum;
                if current.is_empty() || stored.is_empty() {
                    Some(RegenerateReason::FingerprintUnknown)
                } else if current != stored {
                    Some(RegenerateReason::TemplateChanged)
                } else if !inputs_unchanged {
                    Some(RegenerateReason::InputsChanged)
                } else {
                    None
                }
            }
        },
        TemplateSource::Inline(_) => (!inputs_unchanged).then_some(RegenerateReason::InputsChanged),
    };

    match reason {
        Some(reason) => Action::Regenerate { reason },
        None => Action::NoOp,
    }
}
