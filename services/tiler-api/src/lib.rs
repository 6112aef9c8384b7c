//! CBERS band tile API service.
//!
//! XYZ tile endpoints for direct band composites (`/tiles`) and band ratio
//! products (`/processing`), plus scene bounds, metadata and search.

pub mod config;
pub mod handlers;
pub mod metrics;
pub mod pipeline;
pub mod state;

use axum::{extract::Extension, routing::get, Router};
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

pub use config::TilerConfig;
pub use state::{AppState, Backends};

/// Build the HTTP router over shared state.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Tile endpoints
        .route("/tiles/:scene/:z/:x/:y", get(handlers::band_tile_handler))
        .route("/processing/:scene/:z/:x/:y", get(handlers::ratio_tile_handler))
        // Scene endpoints
        .route("/bounds/:scene", get(handlers::bounds_handler))
        .route("/metadata/:scene", get(handlers::metadata_handler))
        .route("/search", get(handlers::search_handler))
        // Health check
        .route("/health", get(handlers::health_handler))
        .route("/favicon.ico", get(handlers::favicon_handler))
        // Metrics
        .route("/metrics", get(handlers::metrics_handler))
        .route("/api/metrics", get(handlers::api_metrics_handler))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
}
