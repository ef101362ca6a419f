//! Error types for the GeoJSON pipeline.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Result type alias using StoreError.
pub type StoreResult<T> = Result<T, StoreError>;

/// Processing stage an error is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Input,
    Fetch,
    Parse,
    Validate,
    Load,
    Dispatch,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Input => "input",
            Stage::Fetch => "fetch",
            Stage::Parse => "parse",
            Stage::Validate => "validate",
            Stage::Load => "load",
            Stage::Dispatch => "dispatch",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structural violations found while validating a GeoJSON document.
///
/// Feature indices are 0-based positions within the `features` array.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("GeoJSON must be a JSON object")]
    NotAnObject,

    #[error("Must be a FeatureCollection")]
    NotFeatureCollection,

    #[error("No features found")]
    MissingFeatures,

    #[error("Features must be a list")]
    FeaturesNotList,

    #[error("No features in collection")]
    EmptyFeatures,

    #[error("Feature {0} is not an object")]
    FeatureNotObject(usize),

    #[error("Feature {0} type is not 'Feature'")]
    FeatureWrongType(usize),

    #[error("Feature {0} missing geometry")]
    FeatureMissingGeometry(usize),
}

/// Primary error type for ingestion and dispatch.
///
/// The `Display` output of each variant is the human-readable failure
/// reason reported to callers.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    Input(String),

    #[error("fetch error: {0}")]
    Fetch(String),

    #[error("invalid JSON: {0}")]
    Parse(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("load error: {0}")]
    Load(String),

    #[error("dispatch launch error: {0}")]
    DispatchLaunch(String),
}

impl PipelineError {
    /// Stage this error belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Input(_) => Stage::Input,
            PipelineError::Fetch(_) => Stage::Fetch,
            PipelineError::Parse(_) => Stage::Parse,
            PipelineError::Validation(_) => Stage::Validate,
            PipelineError::Load(_) => Stage::Load,
            PipelineError::DispatchLaunch(_) => Stage::Dispatch,
        }
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Parse(err.to_string())
    }
}

/// Errors raised by storage adapters (object store, spatial store, queue).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Secret error: {0}")]
    Secret(String),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Storage(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_messages() {
        assert_eq!(
            ValidationError::EmptyFeatures.to_string(),
            "No features in collection"
        );
        assert_eq!(
            ValidationError::FeatureMissingGeometry(3).to_string(),
            "Feature 3 missing geometry"
        );
        assert_eq!(
            ValidationError::FeatureWrongType(0).to_string(),
            "Feature 0 type is not 'Feature'"
        );
    }

    #[test]
    fn test_pipeline_error_reasons_are_stage_prefixed() {
        let err = PipelineError::Load("connection refused".to_string());
        assert_eq!(err.to_string(), "load error: connection refused");
        assert_eq!(err.stage(), Stage::Load);

        let err = PipelineError::from(ValidationError::EmptyFeatures);
        assert_eq!(err.to_string(), "No features in collection");
        assert_eq!(err.stage(), Stage::Validate);
    }

    #[test]
    fn test_json_error_maps_to_parse_stage() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err = PipelineError::from(json_err);
        assert_eq!(err.stage(), Stage::Parse);
        assert!(err.to_string().starts_with("invalid JSON: "));
    }
}
