//! Manifest parsing for tmplgen.toml files
//!
//! A manifest declares the backend connection defaults and the set of
//! managed artifacts. A git-ignored local manifest can be merged on top.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tmplgen_client::AuthMode;

use crate::Result;

/// Connection defaults shared by all resources
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendSection {
    /// Base URL of the generation backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Authentication mode; `none` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthMode>,

    /// Per-request timeout in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// One managed artifact as written in the manifest
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_content: Option<String>,

    /// Local file whose content becomes inline template content
    ///
    /// Relative paths are resolved against the manifest directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_file: Option<PathBuf>,

    #[serde(default)]
    pub target: String,

    /// Raw JSON context string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_json: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthMode>,

    /// Structured context, serialized to canonical JSON
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<toml::Table>,
}

/// Parsed content of one manifest file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub backend: BackendSection,

    /// Resources keyed by name
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceSpec>,
}

impl Manifest {
    /// Parse a manifest from TOML content
    ///
    /// # Example
    ///
    /// ```
    /// use tmplgen_core::config::Manifest;
    ///
    /// let manifest = Manifest::parse(r#"
    /// [backend]
    /// endpoint = "https://generator.example.com"
    ///
    /// [resources.orders]
    /// template_path = "gs://templates/dag.py.j2"
    /// target = "gs://dags/orders.py"
    /// context = { schedule = "@daily" }
    /// "#).unwrap();
    ///
    /// assert_eq!(manifest.resources["orders"].target, "gs://dags/orders.py");
    /// ```
    pub fn parse(content: &str) -> Result<Self> {
        let manifest: Manifest = toml::from_str(content)?;
        Ok(manifest)
    }

    /// Create an empty manifest
    pub fn empty() -> Self {
        Self::default()
    }

    /// Merge another manifest into this one
    ///
    /// Backend fields set in `other` override individually. Resources in
    /// `other` replace same-named entries whole; new names are added.
    pub fn merge(&mut self, other: &Manifest) {
        if let Some(endpoint) = &other.backend.endpoint {
            self.backend.endpoint = Some(endpoint.clone());
        }
        if let Some(auth) = other.backend.auth {
            self.backend.auth = Some(auth);
        }
        if let Some(timeout) = other.backend.timeout_secs {
            self.backend.timeout_secs = Some(timeout);
        }

        for (name, spec) in &other.resources {
            self.resources.insert(name.clone(), spec.clone());
        }
    }
}

/// Serialize a TOML table as compact JSON with sorted keys
pub fn context_to_json(table: &toml::Table) -> String {
    let value = JsonValue::Object(
        table
            .iter()
            .map(|(key, value)| (key.clone(), toml_to_json(value)))
            .collect(),
    );
    value.to_string()
}

fn toml_to_json(value: &toml::Value) -> JsonValue {
    match value {
        toml::Value::String(s) => JsonValue::String(s.clone()),
        toml::Value::Integer(i) => JsonValue::from(*i),
        toml::Value::Float(f) => JsonValue::from(*f),
        toml::Value::Boolean(b) => JsonValue::Bool(*b),
        toml::Value::Datetime(dt) => JsonValue::String(dt.to_string()),
        toml::Value::Array(items) => JsonValue::Array(items.iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => JsonValue::Object(
            table
                .iter()
                .map(|(key, value)| (key.clone(), toml_to_json(value)))
                .collect(),
        ),
    }
}
