//! Wire types exchanged with the generation backend

use serde::{Deserialize, Deserializer, Serialize};

/// Body of `POST /generate`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerateRequest {
    /// Remote template location (e.g. `gs://bucket/template.j2`)
    #[serde(rename = "template_gcs_path", skip_serializing_if = "Option::is_none")]
    pub template_path: Option<String>,
    /// Inline template content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_content: Option<String>,
    /// Destination of the rendered artifact
    #[serde(rename = "target_gcs_path")]
    pub target: String,
    /// Serialized JSON context passed to the renderer
    #[serde(rename = "context_json")]
    pub context: String,
}

/// Body of `POST /delete`
#[derive(Debug, Clone, Serialize)]
pub(crate) struct DeleteRequest<'a> {
    pub target_gcs_path: &'a str,
}

/// Fingerprint and generation of a rendered artifact
///
/// Returned by both `/generate` and `/status`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactStatus {
    /// Content checksum of the artifact
    #[serde(default)]
    pub checksum: String,
    /// Backend-assigned generation of the artifact
    #[serde(default, deserialize_with = "string_or_number")]
    pub generation: String,
}

/// Status of a remote template
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateStatus {
    #[serde(default)]
    pub checksum: String,
    #[serde(default)]
    pub last_modified: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub generation: String,
    #[serde(default)]
    pub exists: bool,
}

impl TemplateStatus {
    /// Status reported for a template the backend does not know about
    pub fn absent() -> Self {
        Self::default()
    }
}

/// Accept generation tokens encoded either as JSON strings or numbers
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Unsigned(u64),
        Signed(i64),
        Float(f64),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        None => String::new(),
        Some(Raw::Text(text)) => text,
        Some(Raw::Unsigned(n)) => n.to_string(),
        Some(Raw::Signed(n)) => n.to_string(),
        Some(Raw::Float(n)) => n.to_string(),
    })
}
