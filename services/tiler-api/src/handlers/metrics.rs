//! Health and metrics endpoints.

use axum::{
    extract::Extension,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use crate::state::AppState;

/// GET /health - Liveness check
pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /favicon.ico - empty body, so browsers hitting tile URLs do not log errors
pub async fn favicon_handler() -> impl IntoResponse {
    (
        StatusCode::NO_CONTENT,
        [(header::CONTENT_TYPE, "text/plain")],
        "",
    )
}

/// GET /metrics - Prometheus exposition
pub async fn metrics_handler(Extension(state): Extension<Arc<AppState>>) -> Response {
    let body = state
        .prometheus
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default();
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response()
}

/// GET /api/metrics - JSON snapshot of the in-process collector
pub async fn api_metrics_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Json<serde_json::Value> {
    let snapshot = state.metrics.snapshot().await;
    Json(serde_json::json!({
        "metrics": snapshot,
        "ratios": state.ratios.names(),
        "colormaps": state.colormaps.names(),
    }))
}
