//! Object locations (bucket + key) in the source object store.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single object in a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Lower-cased extension of the key's final segment, without the dot.
    pub fn extension(&self) -> Option<String> {
        let file_name = self.key.rsplit('/').next()?;
        let (stem, ext) = file_name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_lowercase())
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let loc = ObjectLocation::new("uploads", "region/a.geojson");
        assert_eq!(loc.to_string(), "uploads/region/a.geojson");
    }

    #[test]
    fn test_extension() {
        assert_eq!(
            ObjectLocation::new("b", "dir/File.GeoJSON").extension().as_deref(),
            Some("geojson")
        );
        assert_eq!(ObjectLocation::new("b", "dir.v2/readme").extension(), None);
        assert_eq!(ObjectLocation::new("b", ".geojson").extension(), None);
        assert_eq!(ObjectLocation::new("b", "notes.txt").extension().as_deref(), Some("txt"));
    }
}
