//! Loading validated features into the spatial store.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

use geo_common::{PipelineError, TableName};
use storage::{FeatureRecord, SpatialStore};

use crate::validate::FeatureCollection;

/// Outcome of a successful load.
#[derive(Debug, Clone, Serialize)]
pub struct LoadSummary {
    pub table: TableName,
    pub feature_count: u64,
    pub processing_id: Uuid,
    pub processed_at: DateTime<Utc>,
}

/// Build one provenance-stamped record per feature.
///
/// String and numeric feature ids are kept as text, other id values are
/// dropped. Missing or `null` properties become an empty object.
pub fn build_records(
    collection: &FeatureCollection<'_>,
    source_key: &str,
    processed_at: DateTime<Utc>,
    processing_id: Uuid,
) -> Vec<FeatureRecord> {
    collection
        .iter()
        .map(|feature| FeatureRecord {
            feature_index: feature.index as i32,
            feature_id: feature.id.and_then(|id| match id {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            }),
            geometry: feature.geometry.clone(),
            properties: match feature.properties {
                None | Some(Value::Null) => Value::Object(Map::new()),
                Some(props) => props.clone(),
            },
            file_source: source_key.to_string(),
            processed_at,
            processing_id,
        })
        .collect()
}

/// Writes feature collections to their destination tables.
#[derive(Clone)]
pub struct FeatureLoader {
    store: Arc<dyn SpatialStore>,
    chunk_size: usize,
}

impl FeatureLoader {
    pub fn new(store: Arc<dyn SpatialStore>, chunk_size: usize) -> Self {
        Self { store, chunk_size }
    }

    pub fn store(&self) -> &Arc<dyn SpatialStore> {
        &self.store
    }

    /// Replace `table` with the features of `collection`.
    ///
    /// Every row of one call shares a single `processing_id` and
    /// `processed_at`.
    #[instrument(skip(self, collection), fields(table = %table, features = collection.len()))]
    pub async fn load(
        &self,
        collection: &FeatureCollection<'_>,
        source_key: &str,
        table: &TableName,
    ) -> Result<LoadSummary, PipelineError> {
        let processing_id = Uuid::new_v4();
        let processed_at = Utc::now();
        let records = build_records(collection, source_key, processed_at, processing_id);

        let feature_count = self
            .store
            .replace_table(table, &records, self.chunk_size)
            .await
            .map_err(|e| PipelineError::Load(e.to_string()))?;

        debug!(%processing_id, feature_count, "Load committed");

        Ok(LoadSummary {
            table: table.clone(),
            feature_count,
            processing_id,
            processed_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::validate;
    use serde_json::json;
    use storage::MemoryStore;

    fn document() -> Value {
        json!({
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "id": "road-1", "geometry": {"type": "Point", "coordinates": [0, 0]}, "properties": {"lanes": 2}},
                {"type": "Feature", "id": 17, "geometry": null, "properties": null},
                {"type": "Feature", "id": {"nested": true}, "geometry": {"type": "Point", "coordinates": [1, 1]}}
            ]
        })
    }

    #[test]
    fn test_build_records_stamps_provenance() {
        let doc = document();
        let collection = validate(&doc).unwrap();
        let run = Uuid::new_v4();
        let now = Utc::now();

        let records = build_records(&collection, "region/a.geojson", now, run);

        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.processing_id == run && r.processed_at == now));
        assert!(records.iter().all(|r| r.file_source == "region/a.geojson"));
        assert_eq!(records[0].feature_id.as_deref(), Some("road-1"));
        assert_eq!(records[1].feature_id.as_deref(), Some("17"));
        assert_eq!(records[2].feature_id, None);
        assert_eq!(records[0].properties, json!({"lanes": 2}));
        assert_eq!(records[1].properties, json!({}));
        assert_eq!(records[2].properties, json!({}));
        assert!(records[1].geometry.is_null());
        assert_eq!(records[2].feature_index, 2);
    }

    #[tokio::test]
    async fn test_load_replaces_table() {
        let store = Arc::new(MemoryStore::new());
        let loader = FeatureLoader::new(store.clone(), 2);
        let doc = document();
        let collection = validate(&doc).unwrap();
        let table = TableName::new("geojson_region_a_geojson");

        let summary = loader.load(&collection, "region/a.geojson", &table).await.unwrap();

        assert_eq!(summary.feature_count, 3);
        let rows = store.rows(&table).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.processing_id == summary.processing_id));
    }

    #[tokio::test]
    async fn test_load_failure_maps_to_load_error() {
        let loader = FeatureLoader::new(Arc::new(MemoryStore::unreachable("refused")), 1000);
        let doc = document();
        let collection = validate(&doc).unwrap();

        let err = loader
            .load(&collection, "a.geojson", &TableName::new("geojson_a_geojson"))
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Load(_)));
        assert!(err.to_string().starts_with("load error: "));
    }
}
