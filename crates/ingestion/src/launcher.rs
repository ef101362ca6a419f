//! Work launchers: how the dispatcher starts one isolated run per file.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::{JoinError, JoinHandle};
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use geo_common::{ObjectLocation, PipelineError};
use storage::{JobQueue, ProcessJob};

use crate::ingester::{Ingester, IngestionResult};

/// Acknowledgement that a run was started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchAck {
    pub launch_id: String,
}

/// Starts a processing run for one object.
///
/// Returning `Ok` means the run was handed off, not that it succeeded.
#[async_trait]
pub trait WorkLauncher: Send + Sync {
    async fn launch(&self, location: &ObjectLocation) -> Result<LaunchAck, PipelineError>;
}

/// Hands runs to processor workers through the Redis job stream.
#[derive(Clone)]
pub struct QueueLauncher {
    queue: JobQueue,
}

impl QueueLauncher {
    pub fn new(queue: JobQueue) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl WorkLauncher for QueueLauncher {
    async fn launch(&self, location: &ObjectLocation) -> Result<LaunchAck, PipelineError> {
        let job = ProcessJob::new(location);
        let entry_id = self
            .queue
            .enqueue(&job)
            .await
            .map_err(|e| PipelineError::DispatchLaunch(format!("{}: {}", location, e)))?;

        info!(job_id = %job.id, entry_id = %entry_id, file = %location, "Enqueued processing job");
        Ok(LaunchAck {
            launch_id: job.id.to_string(),
        })
    }
}

/// Runs each file on its own tokio task inside this process.
pub struct TaskLauncher {
    ingester: Arc<Ingester>,
    handles: Mutex<Vec<JoinHandle<IngestionResult>>>,
}

impl TaskLauncher {
    pub fn new(ingester: Arc<Ingester>) -> Self {
        Self {
            ingester,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Number of launched runs not yet collected by [`TaskLauncher::join_all`].
    pub async fn pending(&self) -> usize {
        self.handles.lock().await.len()
    }

    /// Wait for every launched run and collect its result, in launch order.
    pub async fn join_all(&self) -> Vec<Result<IngestionResult, JoinError>> {
        let handles = std::mem::take(&mut *self.handles.lock().await);
        futures::future::join_all(handles).await
    }
}

#[async_trait]
impl WorkLauncher for TaskLauncher {
    async fn launch(&self, location: &ObjectLocation) -> Result<LaunchAck, PipelineError> {
        let launch_id = Uuid::new_v4().to_string();
        let ingester = self.ingester.clone();
        let location = location.clone();
        let span = info_span!("run", launch_id = %launch_id);

        let handle = tokio::spawn(
            async move { ingester.process_file(&location).await }.instrument(span),
        );
        self.handles.lock().await.push(handle);

        Ok(LaunchAck { launch_id })
    }
}
