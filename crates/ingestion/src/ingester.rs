//! Main Ingester struct for GeoJSON file processing.

use metrics::{counter, histogram};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument};
use uuid::Uuid;

use geo_common::{ObjectLocation, PipelineError, Stage, TableName};
use storage::{SourceStore, SpatialStore};

use crate::config::IngestionConfig;
use crate::loader::{FeatureLoader, LoadSummary};
use crate::table_name::derive_table_name;
use crate::validate::validate;

/// Outcome of processing one file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IngestionResult {
    Success {
        feature_count: u64,
        table: TableName,
        processing_id: Uuid,
    },
    Failure {
        stage: Stage,
        reason: String,
    },
}

impl IngestionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, IngestionResult::Success { .. })
    }

    pub fn feature_count(&self) -> Option<u64> {
        match self {
            IngestionResult::Success { feature_count, .. } => Some(*feature_count),
            IngestionResult::Failure { .. } => None,
        }
    }

    /// Human-readable summary, the failure reason for failures.
    pub fn message(&self) -> String {
        match self {
            IngestionResult::Success { feature_count, .. } => {
                format!("Processed {} features", feature_count)
            }
            IngestionResult::Failure { reason, .. } => reason.clone(),
        }
    }
}

/// Core ingester for GeoJSON uploads.
///
/// Runs fetch, parse, validate, derive and load for one source object.
/// Holds no per-file state, so one instance can serve any number of
/// concurrent runs.
pub struct Ingester {
    /// Source object reader (MinIO/S3)
    source: Arc<dyn SourceStore>,
    /// Destination table writer
    loader: FeatureLoader,
    config: IngestionConfig,
}

impl Ingester {
    /// Create a new Ingester.
    pub fn new(
        source: Arc<dyn SourceStore>,
        store: Arc<dyn SpatialStore>,
        config: IngestionConfig,
    ) -> Self {
        let loader = FeatureLoader::new(store, config.effective_chunk_size());
        Self {
            source,
            loader,
            config,
        }
    }

    /// Get a reference to the spatial store.
    pub fn spatial_store(&self) -> &Arc<dyn SpatialStore> {
        self.loader.store()
    }

    /// Process one uploaded file into its destination table.
    ///
    /// Never returns an error: every stage failure is logged and reported
    /// as [`IngestionResult::Failure`].
    #[instrument(skip(self), fields(bucket = %location.bucket, key = %location.key))]
    pub async fn process_file(&self, location: &ObjectLocation) -> IngestionResult {
        let started = Instant::now();

        let result = match self.run(location).await {
            Ok(summary) => {
                info!(
                    table = %summary.table,
                    features = summary.feature_count,
                    processing_id = %summary.processing_id,
                    "Ingestion complete"
                );
                counter!("geojson_features_loaded_total").increment(summary.feature_count);
                IngestionResult::Success {
                    feature_count: summary.feature_count,
                    table: summary.table,
                    processing_id: summary.processing_id,
                }
            }
            Err(err) => {
                error!(stage = %err.stage(), error = %err, "Ingestion failed");
                IngestionResult::Failure {
                    stage: err.stage(),
                    reason: err.to_string(),
                }
            }
        };

        let (outcome, stage) = match &result {
            IngestionResult::Success { .. } => ("success", "complete"),
            IngestionResult::Failure { stage, .. } => ("failure", stage.as_str()),
        };
        counter!("geojson_ingestions_total", "outcome" => outcome, "stage" => stage).increment(1);
        histogram!("geojson_ingestion_duration_ms").record(started.elapsed().as_secs_f64() * 1000.0);

        result
    }

    async fn run(&self, location: &ObjectLocation) -> Result<LoadSummary, PipelineError> {
        if location.key.is_empty() {
            return Err(PipelineError::Input("object key must not be empty".to_string()));
        }

        if let Some(limit) = self.config.max_file_bytes {
            let size = self
                .source
                .size(location)
                .await
                .map_err(|e| PipelineError::Fetch(e.to_string()))?;
            if size > limit as u64 {
                return Err(PipelineError::Fetch(format!(
                    "object is {} bytes, limit is {}",
                    size, limit
                )));
            }
        }

        let data = self
            .source
            .fetch(location)
            .await
            .map_err(|e| PipelineError::Fetch(e.to_string()))?;

        let document: Value = serde_json::from_slice(&data)?;
        let collection = validate(&document)?;
        let table = derive_table_name(&location.key);

        self.loader.load(&collection, &location.key, &table).await
    }
}
