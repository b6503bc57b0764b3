//! Declared inputs of a managed artifact

use serde::{Deserialize, Serialize};
use tmplgen_client::{AuthMode, GenerateRequest};

use crate::error::ValidationError;

/// How to reach the generation backend
///
/// Connection settings never take part in reconciliation decisions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    pub backend_endpoint: String,
    #[serde(default)]
    pub auth: AuthMode,
}

impl Connection {
    pub fn new(backend_endpoint: impl Into<String>, auth: AuthMode) -> Self {
        Self {
            backend_endpoint: backend_endpoint.into(),
            auth,
        }
    }
}

/// The template a validated input renders from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateSource<'a> {
    /// Template stored by the backend, addressed by location
    Remote(&'a str),
    /// Literal template content
    Inline(&'a str),
}

impl<'a> TemplateSource<'a> {
    /// The remote template location, if any
    pub fn remote_path(&self) -> Option<&'a str> {
        match self {
            TemplateSource::Remote(path) => Some(path),
            TemplateSource::Inline(_) => None,
        }
    }
}

/// Desired state of one artifact for a reconciliation cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredInput {
    /// Remote template location (e.g. `gs://bucket/dag.py.j2`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_path: Option<String>,

    /// Inline template content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_content: Option<String>,

    /// Destination of the rendered artifact; also the resource identity
    pub target: String,

    /// Serialized JSON passed verbatim to the renderer
    #[serde(default)]
    pub context: String,

    #[serde(default)]
    pub connection: Connection,
}

impl DeclaredInput {
    /// Input rendering a remote template
    pub fn remote(
        template_path: impl Into<String>,
        target: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self {
            template_path: Some(template_path.into()),
            target: target.into(),
            context: context.into(),
            ..Self::default()
        }
    }

    /// Input rendering literal template content
    pub fn inline(
        content: impl Into<String>,
        target: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self {
            template_content: Some(content.into()),
            target: target.into(),
            context: context.into(),
            ..Self::default()
        }
    }

    pub fn with_connection(mut self, connection: Connection) -> Self {
        self.connection = connection;
        self
    }

    /// Validate the input and resolve its template source
    ///
    /// Exactly one of `template_path` and `template_content` must be set. A
    /// value that is empty or whitespace-only counts as unset, so `"  "` is
    /// treated the same as an absent field rather than as a template. The
    /// target must be non-blank.
    ///
    /// # Errors
    ///
    /// Returns the [`ValidationError`] describing the first violation.
    pub fn template_source(&self) -> Result<TemplateSource<'_>, ValidationError> {
        let path = non_blank(self.template_path.as_deref());
        let content = non_blank(self.template_content.as_deref());

        let source = match (path, content) {
            (Some(path), None) => TemplateSource::Remote(path),
            (None, Some(content)) => TemplateSource::Inline(content),
            (None, None) => return Err(ValidationError::TemplateSourceMissing),
            (Some(_), Some(_)) => return Err(ValidationError::TemplateSourceConflict),
        };

        if self.target.trim().is_empty() {
            return Err(ValidationError::TargetMissing);
        }
        Ok(source)
    }

    /// Check the input without resolving its source
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.template_source().map(|_| ())
    }

    /// The remote template location, when one is set
    pub fn remote_template(&self) -> Option<&str> {
        non_blank(self.template_path.as_deref())
    }

    /// Inline content as compared across cycles; empty when unset
    pub fn content(&self) -> &str {
        self.template_content.as_deref().unwrap_or("")
    }

    pub(crate) fn generate_request(&self, source: TemplateSource<'_>) -> GenerateRequest {
        let (template_path, template_content) = match source {
            TemplateSource::Remote(path) => (Some(path.to_string()), None),
            TemplateSource::Inline(content) => (None, Some(content.to_string())),
        };
        GenerateRequest {
            template_path,
            template_content,
            target: self.target.clone(),
            context: self.context.clone(),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
