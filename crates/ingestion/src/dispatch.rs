//! Upload notification handling.
//!
//! Turns S3-style event payloads into per-file processing runs. Keys are
//! percent-decoded, filtered against a [`DispatchPolicy`] and every
//! admitted key gets exactly one launch through a [`WorkLauncher`]. Launches
//! run concurrently and a failed launch never blocks the rest of the batch.

use futures::stream::{self, StreamExt};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

use geo_common::{ObjectLocation, PipelineError};

use crate::config::DispatchConfig;
use crate::launcher::{LaunchAck, WorkLauncher};

// ============================================================================
// Event payload
// ============================================================================

/// S3 event notification document.
#[derive(Debug, Clone, Deserialize)]
pub struct S3Event {
    #[serde(rename = "Records")]
    pub records: Vec<S3EventRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3EventRecord {
    pub s3: S3Entity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Entity {
    pub bucket: S3Bucket,
    pub object: S3Object,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Bucket {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Object {
    /// Key as delivered, still URL-encoded
    pub key: String,
}

impl S3Event {
    /// Notifications in record order.
    pub fn into_notifications(self) -> Vec<UploadNotification> {
        self.records
            .into_iter()
            .map(|r| UploadNotification {
                bucket: r.s3.bucket.name,
                key: r.s3.object.key,
            })
            .collect()
    }
}

/// One uploaded object, with its key as delivered by the event source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadNotification {
    pub bucket: String,
    pub key: String,
}

/// Decode an event key: `+` is a space, then `%XX` escapes.
pub fn decode_key(raw: &str) -> Result<String, String> {
    urlencoding::decode(&raw.replace('+', " "))
        .map(|key| key.into_owned())
        .map_err(|e| e.to_string())
}

// ============================================================================
// Filtering
// ============================================================================

/// Why a notification was not dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    NotGeoJson,
    ReservedPath { folder: String },
    UndecodableKey { cause: String },
}

impl SkipReason {
    /// Rejections are reported as problems; other skips are routine.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, SkipReason::NotGeoJson)
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotGeoJson => write!(f, "Not a GeoJSON file"),
            SkipReason::ReservedPath { folder } => write!(f, "File in system folder: {}", folder),
            SkipReason::UndecodableKey { cause } => write!(f, "Undecodable key: {}", cause),
        }
    }
}

/// Which keys are admitted for processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchPolicy {
    /// Required extension, compared case-insensitively
    pub extension: String,
    /// Directory names whose contents are never processed
    pub reserved_folders: Vec<String>,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            extension: "geojson".to_string(),
            reserved_folders: ["_system", ".tmp", "logs", "backups"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl DispatchPolicy {
    /// Decode and check a notification, yielding the location to process.
    pub fn admit(&self, notification: &UploadNotification) -> Result<ObjectLocation, SkipReason> {
        let key = decode_key(&notification.key)
            .map_err(|cause| SkipReason::UndecodableKey { cause })?;
        let location = ObjectLocation::new(&notification.bucket, key);

        if !location
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(&self.extension))
        {
            return Err(SkipReason::NotGeoJson);
        }

        let mut segments: Vec<&str> = location.key.split('/').collect();
        segments.pop();
        for segment in segments {
            if let Some(folder) = self
                .reserved_folders
                .iter()
                .find(|f| f.eq_ignore_ascii_case(segment))
            {
                return Err(SkipReason::ReservedPath {
                    folder: folder.clone(),
                });
            }
        }

        Ok(location)
    }
}

// ============================================================================
// Report
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct DispatchedUpload {
    /// Position in the received batch
    pub index: usize,
    pub bucket: String,
    pub key: String,
    pub launch_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedUpload {
    pub index: usize,
    pub bucket: String,
    /// Key as received
    pub key: String,
    pub reason: SkipReason,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedLaunch {
    pub index: usize,
    pub bucket: String,
    pub key: String,
    pub error: String,
}

/// Per-batch outcome, entries ordered by batch position.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchReport {
    pub received: usize,
    pub dispatched: Vec<DispatchedUpload>,
    pub skipped: Vec<SkippedUpload>,
    pub failed: Vec<FailedLaunch>,
}

impl DispatchReport {
    pub fn dispatched_count(&self) -> usize {
        self.dispatched.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Fans a batch of upload notifications out into independent runs.
pub struct EventDispatcher {
    launcher: Arc<dyn WorkLauncher>,
    policy: DispatchPolicy,
    concurrency: usize,
}

impl EventDispatcher {
    pub fn new(launcher: Arc<dyn WorkLauncher>, config: DispatchConfig) -> Self {
        Self {
            launcher,
            policy: config.policy,
            concurrency: config.concurrency.max(1),
        }
    }

    /// Dispatch one run per admitted notification.
    pub async fn dispatch(&self, notifications: Vec<UploadNotification>) -> DispatchReport {
        let mut report = DispatchReport {
            received: notifications.len(),
            ..Default::default()
        };

        let mut admitted = Vec::new();
        for (index, notification) in notifications.into_iter().enumerate() {
            match self.policy.admit(&notification) {
                Ok(location) => admitted.push((index, location)),
                Err(reason) => {
                    if reason.is_rejection() {
                        warn!(bucket = %notification.bucket, key = %notification.key, reason = %reason, "Rejected upload");
                    } else {
                        info!(bucket = %notification.bucket, key = %notification.key, reason = %reason, "Skipping upload");
                    }
                    counter!("geojson_dispatch_total", "outcome" => "skipped").increment(1);
                    report.skipped.push(SkippedUpload {
                        index,
                        bucket: notification.bucket,
                        key: notification.key,
                        message: reason.to_string(),
                        reason,
                    });
                }
            }
        }

        let launcher = &self.launcher;
        let mut launched: Vec<(usize, ObjectLocation, Result<LaunchAck, PipelineError>)> =
            stream::iter(admitted)
                .map(|(index, location)| async move {
                    let outcome = launcher.launch(&location).await;
                    (index, location, outcome)
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;
        launched.sort_by_key(|(index, ..)| *index);

        for (index, location, outcome) in launched {
            match outcome {
                Ok(ack) => {
                    info!(file = %location, launch_id = %ack.launch_id, "Dispatched upload");
                    counter!("geojson_dispatch_total", "outcome" => "dispatched").increment(1);
                    report.dispatched.push(DispatchedUpload {
                        index,
                        bucket: location.bucket,
                        key: location.key,
                        launch_id: ack.launch_id,
                    });
                }
                Err(e) => {
                    error!(file = %location, error = %e, "Failed to launch processing");
                    counter!("geojson_dispatch_total", "outcome" => "failed").increment(1);
                    report.failed.push(FailedLaunch {
                        index,
                        bucket: location.bucket,
                        key: location.key,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            received = report.received,
            dispatched = report.dispatched_count(),
            skipped = report.skipped_count(),
            failed = report.failed_count(),
            "Dispatch complete"
        );
        report
    }
}
