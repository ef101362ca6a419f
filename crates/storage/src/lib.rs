//! Storage abstractions for the GeoJSON pipeline.
//!
//! Provides unified interfaces for:
//! - Object storage (S3/MinIO) for uploaded source files
//! - PostgreSQL/PostGIS for loaded feature tables
//! - Database secrets for resolving store credentials
//! - Redis Streams for dispatching processing jobs

pub mod memory;
pub mod object_store;
pub mod postgis;
pub mod queue;
pub mod secrets;
pub mod spatial;

pub use self::object_store::{ObjectStorage, ObjectStorageConfig, SourceStore};
pub use memory::MemoryStore;
pub use postgis::{PostgisConfig, PostgisStore};
pub use queue::{JobQueue, ProcessJob};
pub use secrets::{DatabaseSecret, SecretSource};
pub use spatial::{FeatureRecord, SpatialStore, MAX_CHUNK_SIZE};
