//! HTTP server for the processor service.
//!
//! Provides endpoints for:
//! - `POST /process` - Process one uploaded file
//! - `GET /status` - Readiness, including a database round trip
//! - `GET /health` - Liveness
//! - `GET /metrics` - Prometheus metrics

use axum::{
    extract::{rejection::JsonRejection, Extension, Json},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use geo_common::ObjectLocation;
use ingestion::Ingester;

const SERVICE_NAME: &str = "geojson-processor";

/// Shared state for the HTTP server.
pub struct AppState {
    pub ingester: Arc<Ingester>,
    /// Bucket used when a request does not name one
    pub default_bucket: String,
    pub prometheus: PrometheusHandle,
}

/// Request body for /process.
#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
}

/// Response body for /process.
#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    /// `success` or `error`
    pub status: &'static str,
    pub message: String,
    /// `bucket/key`
    pub file: String,
}

fn bad_request(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": message.into() })),
    )
        .into_response()
}

/// POST /process - Process a file
async fn process_handler(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<ProcessRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "Rejected process request");
            return bad_request(format!("Invalid request body: {}", rejection.body_text()));
        }
    };

    let Some(key) = request.key.filter(|k| !k.is_empty()) else {
        return bad_request("Missing 'key' in request body");
    };
    let bucket = request
        .bucket
        .filter(|b| !b.is_empty())
        .unwrap_or_else(|| state.default_bucket.clone());
    let location = ObjectLocation::new(bucket, key);

    info!(file = %location, "Received process request");

    let result = state.ingester.process_file(&location).await;
    let (code, status) = if result.is_success() {
        (StatusCode::OK, "success")
    } else {
        (StatusCode::BAD_REQUEST, "error")
    };

    (
        code,
        Json(ProcessResponse {
            status,
            message: result.message(),
            file: location.to_string(),
        }),
    )
        .into_response()
}

/// GET /health - Liveness check
async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "service": SERVICE_NAME,
    }))
}

/// GET /status - Readiness check against the spatial store
async fn status_handler(Extension(state): Extension<Arc<AppState>>) -> Response {
    match state.ingester.spatial_store().ping().await {
        Ok(version) => Json(json!({
            "status": "operational",
            "database": "connected",
            "db_version": version,
            "s3_bucket": state.default_bucket,
            "timestamp": Utc::now().to_rfc3339(),
        }))
        .into_response(),
        Err(e) => {
            warn!(error = %e, "Status check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "degraded",
                    "error": e.to_string(),
                    "timestamp": Utc::now().to_rfc3339(),
                })),
            )
                .into_response()
        }
    }
}

/// GET /metrics - Prometheus metrics
async fn metrics_handler(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    state.prometheus.render()
}

/// Build the HTTP router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/process", post(process_handler))
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server.
pub async fn start_server(state: Arc<AppState>, port: u16) -> anyhow::Result<()> {
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(port = port, "Starting processor HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
