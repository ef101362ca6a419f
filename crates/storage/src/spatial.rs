//! Spatial store interface and the row type loaded into it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use geo_common::{StoreResult, TableName};

/// Bind parameters per inserted row.
pub const COLUMNS_PER_ROW: usize = 7;

/// Largest chunk that stays under PostgreSQL's 65535 bind parameter limit.
pub const MAX_CHUNK_SIZE: usize = u16::MAX as usize / COLUMNS_PER_ROW;

/// One loaded feature: geometry, properties and provenance columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRecord {
    /// Position of the feature within its collection
    pub feature_index: i32,
    /// GeoJSON `id` member rendered as text
    pub feature_id: Option<String>,
    /// GeoJSON geometry object (`Null` for features without geometry)
    pub geometry: serde_json::Value,
    /// Free-form properties, stored as one semi-structured value
    pub properties: serde_json::Value,
    /// Originating object key
    pub file_source: String,
    /// Load time, shared by every row of a run
    pub processed_at: DateTime<Utc>,
    /// Processing run identifier, shared by every row of a run
    pub processing_id: Uuid,
}

impl FeatureRecord {
    /// Geometry serialized for `ST_GeomFromGeoJSON`, `None` for null geometry.
    pub fn geometry_json(&self) -> Option<String> {
        if self.geometry.is_null() {
            None
        } else {
            Some(self.geometry.to_string())
        }
    }
}

/// Destination for feature tables.
///
/// Implementations must expose `replace_table` atomically: after it returns
/// (successfully or not) the table holds either its previous contents or
/// exactly `records`, never a mix.
#[async_trait]
pub trait SpatialStore: Send + Sync {
    /// Replace the contents of `table` with `records`, writing `chunk_size` rows at a time.
    ///
    /// Returns the number of rows written.
    async fn replace_table(
        &self,
        table: &TableName,
        records: &[FeatureRecord],
        chunk_size: usize,
    ) -> StoreResult<u64>;

    /// Check connectivity; returns a server version string.
    async fn ping(&self) -> StoreResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(geometry: serde_json::Value) -> FeatureRecord {
        FeatureRecord {
            feature_index: 0,
            feature_id: None,
            geometry,
            properties: json!({}),
            file_source: "a.geojson".to_string(),
            processed_at: Utc::now(),
            processing_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn test_geometry_json() {
        assert_eq!(record(serde_json::Value::Null).geometry_json(), None);
        let geom = record(json!({"type": "Point", "coordinates": [1, 2]}))
            .geometry_json()
            .unwrap();
        assert!(geom.contains("\"Point\""));
    }

    #[test]
    fn test_max_chunk_size_fits_bind_limit() {
        assert!(MAX_CHUNK_SIZE * COLUMNS_PER_ROW <= 65535);
        assert!(MAX_CHUNK_SIZE >= 1000);
    }
}
