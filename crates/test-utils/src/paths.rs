//! Path utilities for locating test data files and scratch containers.

use std::path::PathBuf;

/// Returns the workspace root directory.
///
/// This is determined by walking up from the test-utils manifest directory.
pub fn workspace_root() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(manifest_dir)
        .parent() // crates/
        .and_then(|p| p.parent()) // workspace root
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from(manifest_dir))
}

/// Returns the path to `crates/{crate_name}/testdata/`.
pub fn crate_testdata_dir(crate_name: &str) -> PathBuf {
    workspace_root()
        .join("crates")
        .join(crate_name)
        .join("testdata")
}

/// Searches for a test file in multiple locations.
///
/// This function checks the following locations in order:
/// 1. Environment variable `TEST_DATA_DIR` (if set)
/// 2. `crates/bag/testdata/`
/// 3. `testdata/` at the workspace root
pub fn find_test_file(name: &str) -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("TEST_DATA_DIR") {
        let path = PathBuf::from(dir).join(name);
        if path.exists() {
            return Some(path);
        }
    }

    [crate_testdata_dir("bag"), workspace_root().join("testdata")]
        .into_iter()
        .map(|dir| dir.join(name))
        .find(|path| path.exists())
}

/// Creates a scratch directory and a container path inside it.
///
/// Keep the returned `TempDir` alive for as long as the path is used.
pub fn temp_bag_path(name: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join(name);
    (dir, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_root_contains_crates() {
        assert!(workspace_root().join("crates").is_dir());
    }

    #[test]
    fn test_missing_file_is_none() {
        assert!(find_test_file("definitely-not-a-real-file.xml").is_none());
    }

    #[test]
    fn test_temp_bag_path_is_fresh() {
        let (dir, path) = temp_bag_path("survey.bag");
        assert!(path.starts_with(dir.path()));
        assert!(!path.exists());
    }
}
