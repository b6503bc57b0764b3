//! [`TestProject`]: a temporary project directory for CLI and apply tests.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A temporary directory holding a `tmplgen.toml` manifest and state.
///
/// # Example
///
/// ```rust,no_run
/// use tmplgen_test_utils::project::TestProject;
///
/// let project = TestProject::new();
/// project.write_manifest("[backend]\nendpoint = \"http://localhost:8080\"\n");
/// project.assert_file_exists("tmplgen.toml");
/// ```
pub struct TestProject {
    temp_dir: TempDir,
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

impl TestProject {
    /// Create an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
        }
    }

    /// Return the root path of the temporary directory.
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Path of the project manifest.
    pub fn manifest_path(&self) -> PathBuf {
        self.root().join("tmplgen.toml")
    }

    /// Path of the default state ledger.
    pub fn state_path(&self) -> PathBuf {
        self.root().join(".tmplgen").join("state.toml")
    }

    /// Write `tmplgen.toml`.
    pub fn write_manifest(&self, content: &str) {
        fs::write(self.manifest_path(), content).unwrap();
    }

    /// Write a manifest with one remote-template resource per `(name, template, target)`.
    pub fn write_remote_manifest(&self, endpoint: &str, resources: &[(&str, &str, &str)]) {
        let mut manifest = format!("[backend]\nendpoint = \"{endpoint}\"\n");
        for (name, template, target) in resources {
            manifest.push_str(&format!(
                "\n[resources.{name}]\ntemplate_path = \"{template}\"\ntarget = \"{target}\"\ncontext = {{ name = \"{name}\" }}\n"
            ));
        }
        self.write_manifest(&manifest);
    }

    /// Write a file relative to the project root, creating parent directories.
    pub fn write_file(&self, relative: &str, content: &str) {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    /// Read the raw state ledger.
    pub fn read_state(&self) -> String {
        fs::read_to_string(self.state_path()).unwrap()
    }

    /// Assert that a file exists relative to the project root.
    pub fn assert_file_exists(&self, relative: &str) {
        let path = self.root().join(relative);
        assert!(path.exists(), "Expected file to exist: {}", path.display());
    }
}
