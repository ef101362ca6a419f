//! Launcher selection for the dispatcher.

use anyhow::{Context, Result};
use clap::ValueEnum;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use ingestion::{Ingester, IngestionConfig, QueueLauncher, TaskLauncher, WorkLauncher};
use storage::{JobQueue, ObjectStorage, ObjectStorageConfig, PostgisConfig, PostgisStore};

/// Where dispatched runs execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LauncherKind {
    /// Enqueue jobs for processor workers
    Queue,
    /// Run the pipeline on tasks inside the dispatcher
    Inline,
}

/// The launcher a dispatcher was built with.
pub enum Launcher {
    Queue(Arc<QueueLauncher>),
    Inline(Arc<TaskLauncher>),
}

impl Launcher {
    pub async fn connect(kind: LauncherKind, redis_url: &str) -> Result<Self> {
        match kind {
            LauncherKind::Queue => {
                let queue = JobQueue::connect(redis_url)
                    .await
                    .context("Failed to connect to job queue")?;
                Ok(Launcher::Queue(Arc::new(QueueLauncher::new(queue))))
            }
            LauncherKind::Inline => {
                let source = Arc::new(ObjectStorage::new(ObjectStorageConfig::from_env()));
                let store = Arc::new(PostgisStore::new(PostgisConfig::from_env()));
                let ingester = Arc::new(Ingester::new(source, store, IngestionConfig::from_env()));
                Ok(Launcher::Inline(Arc::new(TaskLauncher::new(ingester))))
            }
        }
    }

    pub fn work_launcher(&self) -> Arc<dyn WorkLauncher> {
        match self {
            Launcher::Queue(launcher) => launcher.clone() as Arc<dyn WorkLauncher>,
            Launcher::Inline(launcher) => launcher.clone() as Arc<dyn WorkLauncher>,
        }
    }

    /// Wait for inline runs started so far; returns how many failed.
    pub async fn wait_inline(&self) -> usize {
        let Launcher::Inline(launcher) = self else {
            return 0;
        };

        let mut failed = 0;
        for joined in launcher.join_all().await {
            match joined {
                Ok(result) if result.is_success() => {}
                Ok(result) => {
                    warn!(message = %result.message(), "Inline run failed");
                    failed += 1;
                }
                Err(e) => {
                    warn!(error = %e, "Inline run panicked");
                    failed += 1;
                }
            }
        }
        failed
    }

    /// Periodically collect finished inline runs so their handles do not pile up.
    pub fn spawn_reaper(&self, every: Duration) {
        let Launcher::Inline(launcher) = self else {
            return;
        };
        let launcher = launcher.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                let results = launcher.join_all().await;
                if !results.is_empty() {
                    let failed = results
                        .iter()
                        .filter(|r| !matches!(r, Ok(result) if result.is_success()))
                        .count();
                    info!(collected = results.len(), failed, "Collected inline runs");
                }
            }
        });
    }
}
