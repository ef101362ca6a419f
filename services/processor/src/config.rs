//! Processor configuration.

use std::sync::Arc;

use ingestion::{Ingester, IngestionConfig};
use storage::{ObjectStorage, ObjectStorageConfig, PostgisConfig, PostgisStore};

/// Everything a processor needs to build its ingester.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub storage: ObjectStorageConfig,
    pub database: PostgisConfig,
    pub ingestion: IngestionConfig,
}

impl ProcessorConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            storage: ObjectStorageConfig::from_env(),
            database: PostgisConfig::from_env(),
            ingestion: IngestionConfig::from_env(),
        }
    }

    /// Build an ingester reading from S3 and writing to PostGIS.
    ///
    /// Nothing connects yet: the database pool is created on first load.
    pub fn build_ingester(&self) -> Arc<Ingester> {
        let source = Arc::new(ObjectStorage::new(self.storage.clone()));
        let store = Arc::new(PostgisStore::new(self.database.clone()));
        Arc::new(Ingester::new(source, store, self.ingestion.clone()))
    }
}
