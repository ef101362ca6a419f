//! GeoJSON ingestion library.
//!
//! Provides the core logic for turning uploaded GeoJSON files into PostGIS
//! tables, one independent and replaceable table per source object.
//!
//! # Architecture
//!
//! - [`validate`] checks a parsed document is a non-empty `FeatureCollection`
//! - [`derive_table_name`] maps an object key to its destination table
//! - [`FeatureLoader`] builds provenance-stamped rows and replaces the table
//! - [`Ingester`] runs fetch, parse, validate, derive and load for one file
//! - [`EventDispatcher`] filters upload notifications and launches one
//!   isolated run per qualifying file through a [`WorkLauncher`]

pub mod config;
pub mod dispatch;
mod ingester;
pub mod launcher;
mod loader;
mod table_name;
pub mod validate;

// Re-exports
pub use config::{DispatchConfig, IngestionConfig};
pub use dispatch::{
    DispatchPolicy, DispatchReport, EventDispatcher, S3Event, SkipReason, UploadNotification,
};
pub use ingester::{Ingester, IngestionResult};
pub use launcher::{LaunchAck, QueueLauncher, TaskLauncher, WorkLauncher};
pub use loader::{build_records, FeatureLoader, LoadSummary};
pub use table_name::{derive_table_name, TABLE_PREFIX};
pub use validate::{validate, Feature, FeatureCollection};
