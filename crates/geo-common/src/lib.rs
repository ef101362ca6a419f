//! Common types and utilities shared across the GeoJSON pipeline crates.

pub mod error;
pub mod location;
pub mod table;

pub use error::{PipelineError, Stage, StoreError, StoreResult, ValidationError};
pub use location::ObjectLocation;
pub use table::{TableName, MAX_IDENTIFIER_BYTES};
