//! Common test fixtures for GeoJSON pipeline tests.
//!
//! Small, hand-written documents covering the shapes the validator and
//! loader care about.

use serde_json::{json, Value};

/// Bucket used throughout the tests.
pub const TEST_BUCKET: &str = "geojson-uploads";

/// A collection with a single Point feature.
pub fn single_point() -> Value {
    json!({
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "geometry": {"type": "Point", "coordinates": [-122.4194, 37.7749]},
            "properties": {"name": "San Francisco"}
        }]
    })
}

/// A valid collection with no features.
pub fn empty_collection() -> Value {
    json!({"type": "FeatureCollection", "features": []})
}

/// A single Feature, which is not a collection.
pub fn bare_feature() -> Value {
    json!({
        "type": "Feature",
        "geometry": {"type": "Point", "coordinates": [0.0, 0.0]},
        "properties": {}
    })
}

/// Polygon, LineString and null geometry, with and without ids.
pub fn mixed_geometries() -> Value {
    json!({
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "id": "parcel-7",
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]]
                },
                "properties": {"zoning": "R1", "area_m2": 10500.5}
            },
            {
                "type": "Feature",
                "id": 42,
                "geometry": {"type": "LineString", "coordinates": [[0.0, 0.0], [2.0, 2.0, 15.0]]},
                "properties": {"lanes": 2, "tags": ["paved", "lit"]}
            },
            {
                "type": "Feature",
                "geometry": null,
                "properties": null
            }
        ]
    })
}

/// A collection whose third feature has no geometry member.
pub fn missing_geometry_at_index_2() -> Value {
    json!({
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "geometry": null},
            {"type": "Feature", "geometry": null},
            {"type": "Feature", "properties": {"orphan": true}}
        ]
    })
}
