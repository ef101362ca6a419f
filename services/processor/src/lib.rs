//! GeoJSON processor service.
//!
//! Runs the ingestion pipeline behind an HTTP trigger, once for a single
//! object, or as a consumer of the Redis job stream.

pub mod config;
pub mod server;
pub mod worker;

pub use config::ProcessorConfig;
pub use server::{build_router, start_server, AppState};
