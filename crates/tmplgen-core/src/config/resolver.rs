//! Configuration resolution with local overrides
//!
//! The `ConfigResolver` loads the project manifest, merges the optional
//! local override file on top, and turns each resource entry into a
//! [`DeclaredInput`].

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tmplgen_client::AuthMode;
use tmplgen_client::config::DEFAULT_TIMEOUT;

use crate::resource::{Connection, DeclaredInput};
use crate::{Error, Result};

use super::manifest::{Manifest, ResourceSpec, context_to_json};

/// Default manifest file name
pub const MANIFEST_FILE: &str = "tmplgen.toml";

/// Default local override file name
pub const LOCAL_MANIFEST_FILE: &str = "tmplgen.local.toml";

/// The effective configuration after merging all sources
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    /// Per-request timeout for backend calls
    pub timeout: Duration,

    /// Declared inputs keyed by resource name
    pub resources: BTreeMap<String, DeclaredInput>,
}

/// Resolves configuration from a manifest and its local override
///
/// Sources, later overriding earlier:
/// 1. Project manifest (`tmplgen.toml`)
/// 2. Local overrides (`tmplgen.local.toml` next to it) - git-ignored
pub struct ConfigResolver {
    manifest_path: PathBuf,
}

impl ConfigResolver {
    /// Create a resolver for the manifest at `manifest_path`
    pub fn new(manifest_path: impl Into<PathBuf>) -> Self {
        Self {
            manifest_path: manifest_path.into(),
        }
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// Directory relative paths in the manifest are resolved against
    pub fn base_dir(&self) -> &Path {
        self.manifest_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }

    /// Path of the local override file
    pub fn local_path(&self) -> PathBuf {
        self.base_dir().join(LOCAL_MANIFEST_FILE)
    }

    pub fn has_local_overrides(&self) -> bool {
        self.local_path().is_file()
    }

    /// Load and merge the manifest layers without resolving resources
    ///
    /// # Errors
    ///
    /// Returns `ConfigNotFound` if the manifest does not exist, or a parse
    /// error for invalid TOML in either layer.
    pub fn load_manifest(&self) -> Result<Manifest> {
        if !self.manifest_path.is_file() {
            return Err(Error::ConfigNotFound {
                path: self.manifest_path.clone(),
            });
        }

        tracing::debug!(path = ?self.manifest_path, "Loading manifest");
        let content = fs::read_to_string(&self.manifest_path)?;
        let mut manifest = Manifest::parse(&content)?;

        let local_path = self.local_path();
        if local_path.is_file() {
            tracing::debug!(path = ?local_path, "Loading local overrides");
            let content = fs::read_to_string(&local_path)?;
            manifest.merge(&Manifest::parse(&content)?);
        }

        Ok(manifest)
    }

    /// Resolve the configuration by merging all sources
    ///
    /// Template/target invariants are not checked here; the engine
    /// validates each input before contacting the backend.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a resource with no endpoint, with
    /// both `context` and `context_json`, or with `template_file` alongside
    /// another template source, and an I/O error for an unreadable
    /// `template_file`.
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        let manifest = self.load_manifest()?;

        let timeout = manifest
            .backend
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);

        let mut resources = BTreeMap::new();
        for (name, spec) in &manifest.resources {
            let input = self.declared_input(name, spec, &manifest)?;
            resources.insert(name.clone(), input);
        }

        Ok(ResolvedConfig { timeout, resources })
    }

    fn declared_input(
        &self,
        name: &str,
        spec: &ResourceSpec,
        manifest: &Manifest,
    ) -> Result<DeclaredInput> {
        let endpoint = spec
            .endpoint
            .as_ref()
            .or(manifest.backend.endpoint.as_ref())
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| {
                Error::config(format!(
                    "resource '{}' has no endpoint; set [backend] endpoint or a per-resource endpoint",
                    name
                ))
            })?;
        let auth = spec
            .auth
            .or(manifest.backend.auth)
            .unwrap_or(AuthMode::None);

        let context = match (&spec.context, &spec.context_json) {
            (Some(_), Some(_)) => {
                return Err(Error::config(format!(
                    "resource '{}' sets both `context` and `context_json`",
                    name
                )));
            }
            (Some(table), None) => context_to_json(table),
            (None, Some(raw)) => raw.clone(),
            (None, None) => String::new(),
        };

        let template_content = match &spec.template_file {
            Some(_) if spec.template_path.is_some() || spec.template_content.is_some() => {
                return Err(Error::config(format!(
                    "resource '{}' sets `template_file` together with another template source",
                    name
                )));
            }
            Some(file) => {
                let path = self.base_dir().join(file);
                let content = fs::read_to_string(&path).map_err(|e| {
                    Error::config(format!(
                        "resource '{}': cannot read template file {}: {}",
                        name,
                        path.display(),
                        e
                    ))
                })?;
                Some(content)
            }
            None => spec.template_content.clone(),
        };

        Ok(DeclaredInput {
            template_path: spec.template_path.clone(),
            template_content,
            target: spec.target.clone(),
            context,
            connection: Connection::new(endpoint.clone(), auth),
        })
    }
}
