//! GeoJSON processor service.
//!
//! Loads uploaded GeoJSON files into PostGIS, one table per object.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use geo_common::ObjectLocation;
use processor::{server, worker, AppState, ProcessorConfig};
use storage::JobQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// HTTP trigger surface
    Server,
    /// Process S3_BUCKET/S3_KEY once and exit
    #[value(name = "single_file", alias = "single-file")]
    SingleFile,
    /// Consume jobs from the Redis stream
    Queue,
}

#[derive(Parser, Debug)]
#[command(name = "processor")]
#[command(about = "GeoJSON to PostGIS processor")]
struct Args {
    /// Processing mode
    #[arg(long, env = "PROCESSING_MODE", value_enum, default_value = "server")]
    mode: Mode,

    /// Source bucket (defaults for /process requests, required target in single_file mode)
    #[arg(long, env = "S3_BUCKET")]
    bucket: Option<String>,

    /// Object key for single_file mode
    #[arg(long, env = "S3_KEY")]
    key: Option<String>,

    /// HTTP port for server mode
    #[arg(long, env = "PORT", default_value = "8080")]
    port: u16,

    /// Redis URL for queue mode
    #[arg(long, env = "REDIS_URL", default_value = "redis://redis:6379")]
    redis_url: String,

    /// Consumer name within the processors group (queue mode)
    #[arg(long, env = "CONSUMER_NAME")]
    consumer_name: Option<String>,

    /// Seconds a claimed job may sit unacknowledged before another worker takes it over
    #[arg(long, env = "QUEUE_RECLAIM_IDLE_SECS", default_value = "300")]
    reclaim_idle_secs: u64,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// `processor-<pid>`, unique per running process on a host.
fn default_consumer_name() -> String {
    format!("processor-{}", std::process::id())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let prometheus = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    let mut config = ProcessorConfig::from_env();
    if let Some(bucket) = &args.bucket {
        config.storage.bucket = bucket.clone();
    }
    info!(
        mode = ?args.mode,
        bucket = %config.storage.bucket,
        chunk_size = config.ingestion.chunk_size,
        "Starting GeoJSON processor"
    );

    let ingester = config.build_ingester();

    match args.mode {
        Mode::Server => {
            let state = Arc::new(AppState {
                ingester,
                default_bucket: config.storage.bucket.clone(),
                prometheus,
            });
            server::start_server(state, args.port).await
        }
        Mode::SingleFile => {
            let key = args
                .key
                .filter(|k| !k.is_empty())
                .context("S3_KEY is required in single_file mode")?;
            let location = ObjectLocation::new(config.storage.bucket.clone(), key);
            worker::run_single_file(&ingester, &location).await?;
            Ok(())
        }
        Mode::Queue => {
            let queue = JobQueue::connect(&args.redis_url)
                .await
                .context("Failed to connect to job queue")?;
            let consumer = args.consumer_name.unwrap_or_else(default_consumer_name);
            let reclaim_idle = Duration::from_secs(args.reclaim_idle_secs);
            worker::run_queue_worker(ingester, queue, consumer, reclaim_idle).await
        }
    }
}
