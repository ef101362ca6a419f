//! Upload event dispatcher service.
//!
//! Receives S3 event notifications and starts one processing run per
//! qualifying GeoJSON upload.

pub mod launch;
pub mod server;

pub use launch::{Launcher, LauncherKind};
pub use server::{build_router, start_server, AppState};
