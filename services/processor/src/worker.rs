//! Non-HTTP processing modes: one file and exit, or a queue consumer loop.

use anyhow::{bail, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use geo_common::{ObjectLocation, StoreResult};
use ingestion::{Ingester, IngestionResult};
use storage::{JobQueue, ProcessJob};

/// How long one queue read blocks before checking for shutdown again.
const CLAIM_BLOCK_MS: usize = 5000;

/// Process one file; a processing failure becomes an error so the process
/// exits non-zero.
pub async fn run_single_file(ingester: &Ingester, location: &ObjectLocation) -> Result<IngestionResult> {
    info!(file = %location, "Processing single file");

    let result = ingester.process_file(location).await;
    if let IngestionResult::Failure { stage, reason } = &result {
        bail!("processing {} failed at {} stage: {}", location, stage, reason);
    }

    info!(file = %location, message = %result.message(), "Single file processed");
    Ok(result)
}

/// Next job for `consumer`: a stale entry abandoned by another worker first,
/// then a new one.
async fn next_job(
    queue: &JobQueue,
    consumer: &str,
    reclaim_idle: Duration,
) -> StoreResult<Option<(String, ProcessJob)>> {
    if let Some((entry_id, job)) = queue.reclaim_stale(consumer, reclaim_idle).await? {
        warn!(job_id = %job.id, entry_id = %entry_id, "Reclaimed unacknowledged job");
        return Ok(Some((entry_id, job)));
    }
    queue.claim_next(consumer, CLAIM_BLOCK_MS).await
}

/// Consume processing jobs until Ctrl-C.
///
/// Every claimed job is acknowledged once processed, whatever the outcome:
/// retrying is left to whoever enqueued it. A job left unacknowledged for
/// `reclaim_idle` (its worker died mid-run) is taken over and run again.
pub async fn run_queue_worker(
    ingester: Arc<Ingester>,
    queue: JobQueue,
    consumer: String,
    reclaim_idle: Duration,
) -> Result<()> {
    info!(consumer = %consumer, reclaim_idle_secs = reclaim_idle.as_secs(), "Starting queue worker");

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        let claimed = tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested, stopping queue worker");
                break;
            }
            claimed = next_job(&queue, &consumer, reclaim_idle) => claimed,
        };

        match claimed {
            Ok(Some((entry_id, job))) => {
                let location = job.location();
                info!(job_id = %job.id, file = %location, "Claimed processing job");

                let result = ingester.process_file(&location).await;
                info!(job_id = %job.id, success = result.is_success(), message = %result.message(), "Job finished");

                if let Err(e) = queue.ack(&entry_id).await {
                    warn!(job_id = %job.id, error = %e, "Failed to acknowledge job");
                }
            }
            Ok(None) => continue,
            Err(e) => {
                error!(error = %e, "Failed to read job queue");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }

    Ok(())
}
