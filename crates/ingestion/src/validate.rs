//! Structural validation of GeoJSON documents.
//!
//! Only checks what the loader relies on: a top-level `FeatureCollection`
//! with a non-empty `features` array whose entries are objects typed
//! `Feature` that carry a `geometry` member. Geometry values themselves are
//! not inspected (`null` is accepted).

use serde_json::{Map, Value};

use geo_common::ValidationError;

/// A validated feature collection, borrowing from the parsed document.
#[derive(Debug, Clone)]
pub struct FeatureCollection<'a> {
    features: Vec<Feature<'a>>,
}

impl<'a> FeatureCollection<'a> {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature<'a>> {
        self.features.iter()
    }
}

/// A validated feature.
#[derive(Debug, Clone, Copy)]
pub struct Feature<'a> {
    /// 0-based position in the collection
    pub index: usize,
    /// Geometry member (may be `null`)
    pub geometry: &'a Value,
    /// Properties member, if present
    pub properties: Option<&'a Value>,
    /// `id` member, if present
    pub id: Option<&'a Value>,
}

/// Validate a parsed document, stopping at the first violation.
pub fn validate(document: &Value) -> Result<FeatureCollection<'_>, ValidationError> {
    let root = document.as_object().ok_or(ValidationError::NotAnObject)?;

    if root.get("type").and_then(Value::as_str) != Some("FeatureCollection") {
        return Err(ValidationError::NotFeatureCollection);
    }

    let features = root
        .get("features")
        .ok_or(ValidationError::MissingFeatures)?
        .as_array()
        .ok_or(ValidationError::FeaturesNotList)?;

    if features.is_empty() {
        return Err(ValidationError::EmptyFeatures);
    }

    let features = features
        .iter()
        .enumerate()
        .map(|(index, value)| validate_feature(index, value))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(FeatureCollection { features })
}

fn validate_feature(index: usize, value: &Value) -> Result<Feature<'_>, ValidationError> {
    let object: &Map<String, Value> = value
        .as_object()
        .ok_or(ValidationError::FeatureNotObject(index))?;

    if object.get("type").and_then(Value::as_str) != Some("Feature") {
        return Err(ValidationError::FeatureWrongType(index));
    }

    let geometry = object
        .get("geometry")
        .ok_or(ValidationError::FeatureMissingGeometry(index))?;

    Ok(Feature {
        index,
        geometry,
        properties: object.get("properties"),
        id: object.get("id"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn point_feature() -> Value {
        json!({
            "type": "Feature",
            "geometry": {"type": "Point", "coordinates": [1, 2]},
            "properties": {"name": "x"}
        })
    }

    #[test]
    fn test_valid_collection() {
        let doc = json!({"type": "FeatureCollection", "features": [point_feature(), point_feature()]});
        let collection = validate(&doc).unwrap();
        assert_eq!(collection.len(), 2);
        assert_eq!(collection.iter().nth(1).unwrap().index, 1);
    }

    #[test]
    fn test_null_geometry_is_accepted() {
        let doc = json!({
            "type": "FeatureCollection",
            "features": [{"type": "Feature", "geometry": null}]
        });
        let collection = validate(&doc).unwrap();
        let feature = collection.iter().next().unwrap();
        assert!(feature.geometry.is_null());
        assert!(feature.properties.is_none());
    }

    #[test]
    fn test_rejects_non_object() {
        assert_eq!(validate(&json!([1, 2])).unwrap_err(), ValidationError::NotAnObject);
        assert_eq!(validate(&json!("text")).unwrap_err(), ValidationError::NotAnObject);
    }

    #[test]
    fn test_rejects_other_top_level_types() {
        for doc in [
            json!({"type": "Feature", "geometry": null}),
            json!({"type": "featurecollection", "features": [point_feature()]}),
            json!({"features": [point_feature()]}),
            json!({"type": 7, "features": [point_feature()]}),
        ] {
            assert_eq!(validate(&doc).unwrap_err(), ValidationError::NotFeatureCollection);
        }
    }

    #[test]
    fn test_rejects_missing_and_malformed_features() {
        assert_eq!(
            validate(&json!({"type": "FeatureCollection"})).unwrap_err(),
            ValidationError::MissingFeatures
        );
        assert_eq!(
            validate(&json!({"type": "FeatureCollection", "features": {}})).unwrap_err(),
            ValidationError::FeaturesNotList
        );
        assert_eq!(
            validate(&json!({"type": "FeatureCollection", "features": null})).unwrap_err(),
            ValidationError::FeaturesNotList
        );
    }

    #[test]
    fn test_rejects_empty_features() {
        let err = validate(&json!({"type": "FeatureCollection", "features": []})).unwrap_err();
        assert_eq!(err.to_string(), "No features in collection");
    }

    #[test]
    fn test_reports_first_offending_feature() {
        let doc = json!({
            "type": "FeatureCollection",
            "features": [
                point_feature(),
                point_feature(),
                point_feature(),
                {"type": "Feature", "properties": {}},
                "not an object"
            ]
        });
        let err = validate(&doc).unwrap_err();
        assert_eq!(err, ValidationError::FeatureMissingGeometry(3));
        assert_eq!(err.to_string(), "Feature 3 missing geometry");
    }

    #[test]
    fn test_rejects_feature_with_wrong_type() {
        let doc = json!({
            "type": "FeatureCollection",
            "features": [point_feature(), {"type": "Point", "geometry": null}]
        });
        assert_eq!(validate(&doc).unwrap_err(), ValidationError::FeatureWrongType(1));
    }

    #[test]
    fn test_rejects_non_object_feature() {
        let doc = json!({"type": "FeatureCollection", "features": [42]});
        assert_eq!(validate(&doc).unwrap_err(), ValidationError::FeatureNotObject(0));
    }
}
