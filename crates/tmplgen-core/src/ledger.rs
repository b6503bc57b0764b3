//! State ledger
//!
//! The ledger maps resource names to their last persisted [`ResourceState`].
//! It is stored as TOML, read under a shared lock and written atomically
//! under an exclusive lock.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::resource::ResourceState;
use crate::{Error, Result};

const LEDGER_VERSION: &str = "1.0";

/// One tracked resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// When the state was last written
    pub updated_at: DateTime<Utc>,
    pub state: ResourceState,
}

/// Persisted map of resource name to state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateLedger {
    /// Ledger format version for forward compatibility
    version: String,
    #[serde(default)]
    resources: BTreeMap<String, LedgerEntry>,
}

impl Default for StateLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl StateLedger {
    /// Create a new empty ledger
    pub fn new() -> Self {
        Self {
            version: LEDGER_VERSION.to_string(),
            resources: BTreeMap::new(),
        }
    }

    /// Load a ledger from a TOML file with shared lock
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, locked, or parsed, or if
    /// it was written by an incompatible version.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        file.lock_shared()?;

        // Read through the locked handle
        let mut content = String::new();
        (&file).read_to_string(&mut content)?;
        let ledger: StateLedger = toml::from_str(&content)?;

        let major = ledger.version.split('.').next().unwrap_or_default();
        if major != "1" {
            return Err(Error::Ledger {
                message: format!(
                    "unsupported ledger version {} in {}",
                    ledger.version,
                    path.display()
                ),
            });
        }
        Ok(ledger)
    }

    /// Load the ledger, or start an empty one if the file does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::new())
        }
    }

    /// Save the ledger atomically with exclusive lock
    ///
    /// Creates the parent directory if needed. Content is written to a
    /// temporary sibling file and renamed over the target.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or locked.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent)?;
        }

        let lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        lock_file.lock_exclusive()?;

        let temp_path = path.with_extension("toml.tmp");
        fs::write(&temp_path, &content)?;
        fs::rename(&temp_path, path)?;

        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&LedgerEntry> {
        self.resources.get(name)
    }

    /// Record `state` under `name`, stamping the update time
    pub fn upsert(&mut self, name: impl Into<String>, state: ResourceState) {
        self.resources.insert(
            name.into(),
            LedgerEntry {
                updated_at: Utc::now(),
                state,
            },
        );
    }

    /// Stop tracking `name`
    pub fn remove(&mut self, name: &str) -> Option<LedgerEntry> {
        self.resources.remove(name)
    }

    /// Entries in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &LedgerEntry)> {
        self.resources.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    /// Find the entry tracking `target`
    pub fn find_by_target(&self, target: &str) -> Option<(&str, &LedgerEntry)> {
        self.iter().find(|(_, entry)| entry.state.target() == target)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::DeclaredInput;
    use tempfile::tempdir;

    fn state(target: &str) -> ResourceState {
        ResourceState {
            id: target.to_string(),
            input: DeclaredInput::inline("body", target, "{}"),
            ..ResourceState::default()
        }
    }

    #[test]
    fn ledger_new_has_correct_version() {
        let ledger = StateLedger::new();
        assert_eq!(ledger.version, "1.0");
        assert!(ledger.is_empty());
    }

    #[test]
    fn ledger_save_is_atomic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".tmplgen").join("state.toml");

        let mut ledger = StateLedger::new();
        ledger.upsert("orders", state("gs://o/orders.py"));
        ledger.save(&path).unwrap();

        let temp_path = path.with_extension("toml.tmp");
        assert!(!temp_path.exists(), "Temporary file should be cleaned up");

        let loaded = StateLedger::load(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.get("orders").unwrap().state.id, "gs://o/orders.py");

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("version = \"1.0\""));
    }

    #[test]
    fn future_major_version_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.toml");
        fs::write(&path, "version = \"2.0\"\n").unwrap();

        let err = StateLedger::load(&path).unwrap_err();
        assert!(matches!(err, Error::Ledger { .. }), "got {err:?}");
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempdir().unwrap();
        let ledger = StateLedger::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert!(ledger.is_empty());
    }

    #[test]
    fn find_by_target_and_remove() {
        let mut ledger = StateLedger::new();
        ledger.upsert("a", state("gs://o/a.yaml"));
        ledger.upsert("b", state("gs://o/b.yaml"));

        let (name, _) = ledger.find_by_target("gs://o/b.yaml").unwrap();
        assert_eq!(name, "b");

        assert!(ledger.remove("a").is_some());
        assert_eq!(ledger.names().collect::<Vec<_>>(), vec!["b"]);
    }
}
