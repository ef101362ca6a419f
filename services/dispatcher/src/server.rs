//! HTTP server for the dispatcher service.
//!
//! Provides endpoints for:
//! - `POST /events` - Dispatch an S3 event notification
//! - `GET /health` - Liveness
//! - `GET /metrics` - Prometheus metrics

use axum::{
    extract::{rejection::JsonRejection, Extension, Json},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use ingestion::{EventDispatcher, S3Event};

/// Shared state for the HTTP server.
pub struct AppState {
    pub dispatcher: EventDispatcher,
    pub prometheus: PrometheusHandle,
}

/// POST /events - Dispatch one event notification
///
/// Any failed launch turns the response into a 500 so the event source
/// redelivers the batch; reprocessing already-launched keys is harmless.
async fn events_handler(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<S3Event>, JsonRejection>,
) -> Response {
    let event = match payload {
        Ok(Json(event)) => event,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "Rejected event payload");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": format!("Invalid event payload: {}", rejection.body_text())
                })),
            )
                .into_response();
        }
    };

    let report = state.dispatcher.dispatch(event.into_notifications()).await;
    let code = if report.has_failures() {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };

    (code, Json(report)).into_response()
}

/// GET /health - Liveness check
async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "geojson-dispatcher",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /metrics - Prometheus metrics
async fn metrics_handler(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    state.prometheus.render()
}

/// Build the HTTP router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/events", post(events_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server.
pub async fn start_server(state: Arc<AppState>, port: u16) -> anyhow::Result<()> {
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(port = port, "Starting dispatcher HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
