//! Project context detection
//!
//! Finds the manifest and state ledger for a command. Without `--manifest`,
//! the nearest `tmplgen.toml` is found by walking up from the working
//! directory, so commands work from anywhere inside a project.

use std::path::{Path, PathBuf};

use tmplgen_core::config::MANIFEST_FILE;

/// Directory holding the state ledger, next to the manifest
pub const STATE_DIR: &str = ".tmplgen";

/// State ledger file name
pub const STATE_FILE: &str = "state.toml";

/// Files a command operates on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectContext {
    pub manifest_path: PathBuf,
    pub state_path: PathBuf,
}

impl ProjectContext {
    /// Resolve paths from the command-line overrides and the working directory
    ///
    /// An explicit manifest is used as given even if it does not exist, so the
    /// resolver can report it. Without one, the nearest manifest above `cwd`
    /// is used, falling back to `cwd/tmplgen.toml`.
    pub fn detect(manifest: Option<PathBuf>, state: Option<PathBuf>, cwd: &Path) -> Self {
        let manifest_path = match manifest {
            Some(path) if path.is_absolute() => path,
            Some(path) => cwd.join(path),
            None => find_manifest(cwd).unwrap_or_else(|| cwd.join(MANIFEST_FILE)),
        };

        let state_path = match state {
            Some(path) if path.is_absolute() => path,
            Some(path) => cwd.join(path),
            None => manifest_dir(&manifest_path).join(STATE_DIR).join(STATE_FILE),
        };

        Self {
            manifest_path,
            state_path,
        }
    }
}

fn manifest_dir(manifest_path: &Path) -> PathBuf {
    manifest_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default()
}

/// Walk up from `start` looking for a manifest
fn find_manifest(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(MANIFEST_FILE))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn finds_manifest_in_parent_directory() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(MANIFEST_FILE), "").unwrap();
        let nested = temp.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();

        let context = ProjectContext::detect(None, None, &nested);

        assert_eq!(context.manifest_path, temp.path().join(MANIFEST_FILE));
        assert_eq!(
            context.state_path,
            temp.path().join(STATE_DIR).join(STATE_FILE)
        );
    }

    #[test]
    fn missing_manifest_defaults_to_working_directory() {
        let temp = TempDir::new().unwrap();

        let context = ProjectContext::detect(None, None, temp.path());

        assert_eq!(context.manifest_path, temp.path().join(MANIFEST_FILE));
    }

    #[test]
    fn explicit_paths_are_relative_to_working_directory() {
        let temp = TempDir::new().unwrap();

        let context = ProjectContext::detect(
            Some(PathBuf::from("infra/gen.toml")),
            Some(PathBuf::from("state/ledger.toml")),
            temp.path(),
        );

        assert_eq!(context.manifest_path, temp.path().join("infra/gen.toml"));
        assert_eq!(context.state_path, temp.path().join("state/ledger.toml"));
    }

    #[test]
    fn state_follows_explicit_manifest() {
        let temp = TempDir::new().unwrap();

        let context =
            ProjectContext::detect(Some(temp.path().join("infra/gen.toml")), None, temp.path());

        assert_eq!(
            context.state_path,
            temp.path().join("infra").join(STATE_DIR).join(STATE_FILE)
        );
    }
}
