//! Generators for synthetic GeoJSON documents and upload events.

use serde_json::{json, Value};

/// Creates a collection of `n` Point features.
///
/// Feature `i` sits at `(i, -i)` and carries `{"seq": i}`, so rows can be
/// matched back to their source feature.
///
/// # Example
///
/// ```
/// use test_utils::point_collection;
///
/// let doc = point_collection(3);
/// assert_eq!(doc["features"].as_array().unwrap().len(), 3);
/// assert_eq!(doc["features"][2]["properties"]["seq"], 2);
/// ```
pub fn point_collection(n: usize) -> Value {
    let features: Vec<Value> = (0..n)
        .map(|i| {
            json!({
                "type": "Feature",
                "id": format!("pt-{}", i),
                "geometry": {"type": "Point", "coordinates": [i as f64, -(i as f64)]},
                "properties": {"seq": i}
            })
        })
        .collect();

    json!({"type": "FeatureCollection", "features": features})
}

/// Creates a collection whose features each carry a different property set.
pub fn heterogeneous_properties(n: usize) -> Value {
    let features: Vec<Value> = (0..n)
        .map(|i| {
            let properties = match i % 3 {
                0 => json!({"name": format!("feature {}", i)}),
                1 => json!({"height": i * 10, "material": "steel"}),
                _ => json!({"nested": {"depth": i}, "flags": [true, false]}),
            };
            json!({
                "type": "Feature",
                "geometry": {"type": "Point", "coordinates": [0.0, i as f64]},
                "properties": properties
            })
        })
        .collect();

    json!({"type": "FeatureCollection", "features": features})
}

/// Creates an S3 event notification with one record per key.
///
/// Keys are placed in the document as given, so pass them already encoded
/// when testing key decoding.
pub fn s3_event(bucket: &str, keys: &[&str]) -> Value {
    let records: Vec<Value> = keys
        .iter()
        .map(|key| {
            json!({
                "eventVersion": "2.1",
                "eventSource": "aws:s3",
                "eventName": "ObjectCreated:Put",
                "s3": {
                    "bucket": {"name": bucket},
                    "object": {"key": key, "size": 1024}
                }
            })
        })
        .collect();

    json!({"Records": records})
}

/// Serializes a document to the bytes an upload would contain.
pub fn to_bytes(document: &Value) -> Vec<u8> {
    serde_json::to_vec(document).expect("JSON values always serialize")
}
