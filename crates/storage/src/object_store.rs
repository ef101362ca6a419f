//! Object storage interface for uploaded source files (S3/MinIO compatible).

use async_trait::async_trait;
use bytes::Bytes;
use object_store::{aws::AmazonS3Builder, memory::InMemory, path::Path, ObjectMeta, ObjectStore};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use geo_common::{ObjectLocation, StoreError, StoreResult};

/// Read access to source objects.
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// Size of an object in bytes, from its metadata.
    async fn size(&self, location: &ObjectLocation) -> StoreResult<u64>;

    /// Read the full byte content of an object.
    async fn fetch(&self, location: &ObjectLocation) -> StoreResult<Bytes>;
}

/// Configuration for object storage connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStorageConfig {
    /// S3/MinIO endpoint URL (None uses the AWS default endpoint)
    pub endpoint: Option<String>,
    /// Bucket used when a request does not name one
    pub bucket: String,
    /// Access key ID (None falls back to the AWS environment)
    pub access_key_id: Option<String>,
    /// Secret access key
    #[serde(skip_serializing)]
    pub secret_access_key: Option<String>,
    /// AWS region (use "us-east-1" for MinIO)
    pub region: String,
    /// Allow HTTP (for local MinIO)
    pub allow_http: bool,
}

impl Default for ObjectStorageConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            bucket: "geojson-uploads".to_string(),
            access_key_id: None,
            secret_access_key: None,
            region: "us-east-1".to_string(),
            allow_http: false,
        }
    }
}

impl ObjectStorageConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            endpoint: env::var("S3_ENDPOINT").ok().filter(|v| !v.is_empty()),
            bucket: env::var("S3_BUCKET").unwrap_or(defaults.bucket),
            access_key_id: env::var("S3_ACCESS_KEY").ok().filter(|v| !v.is_empty()),
            secret_access_key: env::var("S3_SECRET_KEY").ok().filter(|v| !v.is_empty()),
            region: env::var("S3_REGION").unwrap_or(defaults.region),
            allow_http: env::var("S3_ALLOW_HTTP")
                .map(|v| v == "true")
                .unwrap_or(defaults.allow_http),
        }
    }
}

enum Backend {
    S3(ObjectStorageConfig),
    Memory,
}

/// Object storage client, one underlying store per bucket.
pub struct ObjectStorage {
    backend: Backend,
    stores: Mutex<HashMap<String, Arc<dyn ObjectStore>>>,
}

impl ObjectStorage {
    /// Create a new S3-backed client from config.
    pub fn new(config: ObjectStorageConfig) -> Self {
        Self {
            backend: Backend::S3(config),
            stores: Mutex::new(HashMap::new()),
        }
    }

    /// Create an in-process client; every bucket is a separate in-memory store.
    pub fn in_memory() -> Self {
        Self {
            backend: Backend::Memory,
            stores: Mutex::new(HashMap::new()),
        }
    }

    async fn store_for(&self, bucket: &str) -> StoreResult<Arc<dyn ObjectStore>> {
        let mut stores = self.stores.lock().await;
        if let Some(store) = stores.get(bucket) {
            return Ok(store.clone());
        }

        let store: Arc<dyn ObjectStore> = match &self.backend {
            Backend::S3(config) => Arc::new(build_s3(config, bucket)?) as Arc<dyn ObjectStore>,
            Backend::Memory => Arc::new(InMemory::new()) as Arc<dyn ObjectStore>,
        };
        stores.insert(bucket.to_string(), store.clone());
        Ok(store)
    }

    /// Write bytes to an object.
    #[instrument(skip(self, data), fields(bucket = %location.bucket, key = %location.key))]
    pub async fn put(&self, location: &ObjectLocation, data: Bytes) -> StoreResult<()> {
        let store = self.store_for(&location.bucket).await?;
        debug!(size = data.len(), "Writing object");

        store
            .put(&Path::from(location.key.as_str()), data)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to write {}: {}", location, e)))?;

        Ok(())
    }

    /// Read bytes from an object.
    #[instrument(skip(self), fields(bucket = %location.bucket, key = %location.key))]
    pub async fn get(&self, location: &ObjectLocation) -> StoreResult<Bytes> {
        let store = self.store_for(&location.bucket).await?;

        let result = store
            .get(&Path::from(location.key.as_str()))
            .await
            .map_err(|e| match e {
                object_store::Error::NotFound { .. } => StoreError::NotFound(location.to_string()),
                e => StoreError::Storage(format!("Failed to read {}: {}", location, e)),
            })?;

        let bytes = result
            .bytes()
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to read bytes: {}", e)))?;

        debug!(size = bytes.len(), "Read object");
        Ok(bytes)
    }

    /// Read an object's metadata without its content.
    #[instrument(skip(self), fields(bucket = %location.bucket, key = %location.key))]
    pub async fn head(&self, location: &ObjectLocation) -> StoreResult<ObjectMeta> {
        let store = self.store_for(&location.bucket).await?;

        store
            .head(&Path::from(location.key.as_str()))
            .await
            .map_err(|e| match e {
                object_store::Error::NotFound { .. } => StoreError::NotFound(location.to_string()),
                e => StoreError::Storage(format!("Failed to check {}: {}", location, e)),
            })
    }
}

#[async_trait]
impl SourceStore for ObjectStorage {
    async fn size(&self, location: &ObjectLocation) -> StoreResult<u64> {
        Ok(self.head(location).await?.size as u64)
    }

    async fn fetch(&self, location: &ObjectLocation) -> StoreResult<Bytes> {
        self.get(location).await
    }
}

fn build_s3(config: &ObjectStorageConfig, bucket: &str) -> StoreResult<impl ObjectStore> {
    let mut builder = AmazonS3Builder::from_env()
        .with_bucket_name(bucket)
        .with_region(&config.region);

    if let Some(endpoint) = &config.endpoint {
        builder = builder.with_endpoint(endpoint);
    }
    if let (Some(key_id), Some(secret)) = (&config.access_key_id, &config.secret_access_key) {
        builder = builder
            .with_access_key_id(key_id)
            .with_secret_access_key(secret);
    }
    if config.allow_http {
        builder = builder.with_allow_http(true);
    }

    builder
        .build()
        .map_err(|e| StoreError::Config(format!("Failed to create S3 client: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_roundtrip_is_per_bucket() {
        let storage = ObjectStorage::in_memory();
        let loc = ObjectLocation::new("uploads", "region/a.geojson");
        storage.put(&loc, Bytes::from_static(b"{}")).await.unwrap();

        assert_eq!(storage.size(&loc).await.unwrap(), 2);
        assert_eq!(storage.fetch(&loc).await.unwrap(), Bytes::from_static(b"{}"));

        let other = ObjectLocation::new("archive", "region/a.geojson");
        assert!(matches!(
            storage.size(&other).await.unwrap_err(),
            StoreError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let storage = ObjectStorage::in_memory();
        let err = storage
            .fetch(&ObjectLocation::new("uploads", "missing.geojson"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_s3_client_builds_for_minio() {
        let config = ObjectStorageConfig {
            endpoint: Some("http://minio:9000".to_string()),
            access_key_id: Some("minioadmin".to_string()),
            secret_access_key: Some("minioadmin".to_string()),
            allow_http: true,
            ..Default::default()
        };
        assert!(build_s3(&config, "uploads").is_ok());
    }
}
