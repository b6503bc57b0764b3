//! Persisted record of one managed artifact

use serde::{Deserialize, Serialize};

use super::input::{Connection, DeclaredInput};

/// Backend-confirmed facts about an artifact
///
/// Only ever filled from Generate, GetStatus, or GetTemplateStatus results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedOutput {
    /// Content checksum of the rendered artifact
    #[serde(default)]
    pub artifact_checksum: String,
    /// Backend generation of the last artifact write
    #[serde(default)]
    pub artifact_generation: String,
    /// Checksum of the remote template at last generation; empty for inline content
    #[serde(default)]
    pub template_checksum: String,
}

/// Declared inputs plus last observed outputs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceState {
    /// Resource identity; always equal to `input.target`
    pub id: String,
    pub input: DeclaredInput,
    #[serde(default)]
    pub observed: ObservedOutput,
}

impl ResourceState {
    /// Record for an artifact adopted by identifier
    ///
    /// The identifier becomes the target; template, context, and observed
    /// output stay empty until the next read.
    pub fn imported(id: impl Into<String>, connection: Connection) -> Self {
        let id = id.into();
        Self {
            input: DeclaredInput {
                target: id.clone(),
                connection,
                ..DeclaredInput::default()
            },
            id,
            observed: ObservedOutput::default(),
        }
    }

    pub fn target(&self) -> &str {
        &self.input.target
    }

    pub fn connection(&self) -> &Connection {
        &self.input.connection
    }
}
