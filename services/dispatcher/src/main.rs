//! Upload event dispatcher service.
//!
//! Turns S3 upload notifications into GeoJSON processing runs, either over
//! HTTP or for a single event document read from disk.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use dispatcher::{start_server, AppState, Launcher, LauncherKind};
use ingestion::{DispatchConfig, EventDispatcher, S3Event};

#[derive(Parser, Debug)]
#[command(name = "dispatcher")]
#[command(about = "Dispatches GeoJSON uploads to processors")]
struct Args {
    /// HTTP port
    #[arg(long, env = "PORT", default_value = "8081")]
    port: u16,

    /// Where runs execute
    #[arg(long, env = "DISPATCH_LAUNCHER", value_enum, default_value = "queue")]
    launcher: LauncherKind,

    /// Redis URL for the queue launcher
    #[arg(long, env = "REDIS_URL", default_value = "redis://redis:6379")]
    redis_url: String,

    /// Dispatch one event document and exit
    #[arg(long)]
    event_file: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
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

    let config = DispatchConfig::from_env();
    info!(
        launcher = ?args.launcher,
        concurrency = config.concurrency,
        "Starting GeoJSON dispatcher"
    );

    let launcher = Launcher::connect(args.launcher, &args.redis_url).await?;
    let dispatcher = EventDispatcher::new(launcher.work_launcher(), config);

    if let Some(path) = &args.event_file {
        return dispatch_event_file(&dispatcher, &launcher, path).await;
    }

    launcher.spawn_reaper(Duration::from_secs(30));
    let state = Arc::new(AppState {
        dispatcher,
        prometheus,
    });
    start_server(state, args.port).await
}

/// Dispatch a single event document, waiting for inline runs to finish.
async fn dispatch_event_file(
    dispatcher: &EventDispatcher,
    launcher: &Launcher,
    path: &Path,
) -> Result<()> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let event: S3Event = serde_json::from_slice(&data)
        .with_context(|| format!("Invalid event document {}", path.display()))?;

    let report = dispatcher.dispatch(event.into_notifications()).await;
    println!("{}", serde_json::to_string_pretty(&report)?);

    let failed_runs = launcher.wait_inline().await;
    if report.has_failures() {
        bail!("{} launch(es) failed", report.failed_count());
    }
    if failed_runs > 0 {
        bail!("{} run(s) failed", failed_runs);
    }
    Ok(())
}
