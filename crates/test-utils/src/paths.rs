//! Path utilities for locating test data files.
//!
//! This module provides functions to find test data files across multiple
//! potential locations, supporting both local development and CI environments.

use std::path::PathBuf;

/// Returns the workspace root directory.
///
/// Walks up from the test-utils manifest directory (`crates/test-utils`).
pub fn workspace_root() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(manifest_dir)
        .parent() // crates/
        .and_then(|p| p.parent()) // workspace root
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from(manifest_dir))
}

/// Returns `crates/{crate_name}/testdata/`.
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
/// 2. `crates/ingestion/testdata/`
/// 3. `services/processor/testdata/`
/// 4. `testdata/` at the workspace root
pub fn find_test_file(name: &str) -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(test_data_dir) = std::env::var("TEST_DATA_DIR") {
        candidates.push(PathBuf::from(test_data_dir).join(name));
    }

    let root = workspace_root();
    candidates.extend([
        crate_testdata_dir("ingestion").join(name),
        root.join("services/processor/testdata").join(name),
        root.join("testdata").join(name),
    ]);

    candidates.into_iter().find(|path| path.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_root_is_valid() {
        let root = workspace_root();
        assert!(
            root.join("Cargo.toml").exists(),
            "Workspace root should contain Cargo.toml: {:?}",
            root
        );
    }

    #[test]
    fn test_sample_file_is_found() {
        let path = find_test_file("sample.geojson").expect("sample.geojson should be checked in");
        assert!(path.ends_with("crates/ingestion/testdata/sample.geojson"));
    }
}
