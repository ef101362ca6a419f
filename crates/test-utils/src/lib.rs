//! Shared test utilities for the geojson-pipeline workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Test data path helpers
//! - Skip macros for optional test data
//! - GeoJSON document and event generators
//! - Common test fixtures
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{require_test_file, fixtures};
//! ```

pub mod fixtures;
pub mod generators;
pub mod paths;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;
pub use paths::*;

/// Macro to skip a test if the required file is not found.
///
/// # Usage
///
/// ```ignore
/// use test_utils::require_test_file;
///
/// #[test]
/// fn test_sample_upload() {
///     let path = require_test_file!("sample.geojson");
///     // Test code using path...
/// }
/// ```
///
/// If the file is not found, the test will print a skip message and return early.
#[macro_export]
macro_rules! require_test_file {
    ($name:expr) => {{
        match $crate::find_test_file($name) {
            Some(path) => path,
            None => {
                eprintln!(
                    "SKIPPED: Test file '{}' not found. Add it to a testdata/ directory or set TEST_DATA_DIR.",
                    $name
                );
                return;
            }
        }
    }};
}
