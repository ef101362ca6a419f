//! Redis Streams-based job queue for file processing runs.

use chrono::{DateTime, Utc};
use redis::{
    aio::MultiplexedConnection,
    streams::{StreamAutoClaimOptions, StreamAutoClaimReply, StreamId, StreamReadOptions, StreamReadReply},
    AsyncCommands, Client, RedisResult,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use geo_common::{ObjectLocation, StoreError, StoreResult};

const STREAM_KEY: &str = "geojson:jobs";
const CONSUMER_GROUP: &str = "processors";

/// Redis Streams job queue for processing jobs.
///
/// The multiplexed connection is cheap to clone, so every call works on
/// its own handle and the queue can be shared behind `&self`.
#[derive(Clone)]
pub struct JobQueue {
    conn: MultiplexedConnection,
}

impl JobQueue {
    /// Connect to Redis and initialize the stream.
    pub async fn connect(redis_url: &str) -> StoreResult<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| StoreError::Queue(format!("Redis connection failed: {}", e)))?;

        let mut conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::Queue(format!("Redis connection failed: {}", e)))?;

        // Create consumer group; BUSYGROUP means it already exists
        let created: RedisResult<()> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(STREAM_KEY)
            .arg(CONSUMER_GROUP)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;
        if let Err(e) = created {
            if e.code() != Some("BUSYGROUP") {
                return Err(StoreError::Queue(format!("Consumer group setup failed: {}", e)));
            }
        }

        Ok(Self { conn })
    }

    /// Enqueue a processing job; returns the stream entry id.
    pub async fn enqueue(&self, job: &ProcessJob) -> StoreResult<String> {
        let job_json = serde_json::to_string(job)?;
        let mut conn = self.conn.clone();

        let entry_id: String = redis::cmd("XADD")
            .arg(STREAM_KEY)
            .arg("*")
            .arg("job_id")
            .arg(job.id.to_string())
            .arg("data")
            .arg(&job_json)
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Queue(format!("Enqueue failed: {}", e)))?;

        Ok(entry_id)
    }

    /// Claim the next available job (for workers), blocking up to `block_ms`.
    ///
    /// Returns the stream entry id with the job; pass the id to [`JobQueue::ack`].
    pub async fn claim_next(
        &self,
        consumer_name: &str,
        block_ms: usize,
    ) -> StoreResult<Option<(String, ProcessJob)>> {
        let opts = StreamReadOptions::default()
            .group(CONSUMER_GROUP, consumer_name)
            .count(1)
            .block(block_ms);
        let mut conn = self.conn.clone();

        let result: StreamReadReply = conn
            .xread_options(&[STREAM_KEY], &[">"], &opts)
            .await
            .map_err(|e| StoreError::Queue(format!("Read failed: {}", e)))?;

        for stream_key in result.keys {
            for entry in stream_key.ids {
                if let Some(job) = decode_job(&entry)? {
                    return Ok(Some((entry.id, job)));
                }
            }
        }

        Ok(None)
    }

    /// Take over one entry another consumer claimed but never acknowledged.
    ///
    /// Entries pending for at least `min_idle` are transferred to `consumer`,
    /// so a job whose worker died is processed again. Needs Redis 6.2+.
    pub async fn reclaim_stale(
        &self,
        consumer_name: &str,
        min_idle: Duration,
    ) -> StoreResult<Option<(String, ProcessJob)>> {
        let opts = StreamAutoClaimOptions::default().count(1);
        let mut conn = self.conn.clone();

        let reply: StreamAutoClaimReply = conn
            .xautoclaim_options(
                STREAM_KEY,
                CONSUMER_GROUP,
                consumer_name,
                min_idle.as_millis() as u64,
                "0-0",
                opts,
            )
            .await
            .map_err(|e| StoreError::Queue(format!("Reclaim failed: {}", e)))?;

        for entry in reply.claimed {
            if let Some(job) = decode_job(&entry)? {
                return Ok(Some((entry.id, job)));
            }
        }

        Ok(None)
    }

    /// Acknowledge a claimed entry so it is not redelivered.
    pub async fn ack(&self, entry_id: &str) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn
            .xack(STREAM_KEY, CONSUMER_GROUP, &[entry_id])
            .await
            .map_err(|e| StoreError::Queue(format!("Ack failed: {}", e)))?;
        Ok(())
    }
}

fn decode_job(entry: &StreamId) -> StoreResult<Option<ProcessJob>> {
    let Some(data) = entry.map.get("data") else {
        return Ok(None);
    };
    let bytes: Vec<u8> = redis::from_redis_value(data)
        .map_err(|e| StoreError::Queue(format!("Parse failed: {}", e)))?;
    Ok(Some(serde_json::from_slice(&bytes)?))
}

/// A request to process one uploaded file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessJob {
    pub id: Uuid,
    pub bucket: String,
    pub key: String,
    pub enqueued_at: DateTime<Utc>,
}

impl ProcessJob {
    pub fn new(location: &ObjectLocation) -> Self {
        Self {
            id: Uuid::new_v4(),
            bucket: location.bucket.clone(),
            key: location.key.clone(),
            enqueued_at: Utc::now(),
        }
    }

    pub fn location(&self) -> ObjectLocation {
        ObjectLocation::new(&self.bucket, &self.key)
    }
}
