//! HTTP request handlers.
//!
//! - `tiles`: band and ratio tile endpoints
//! - `scenes`: bounds, metadata and catalog search
//! - `metrics`: health, Prometheus and JSON metrics
//! - `common`: error and image responses

pub mod common;
pub mod metrics;
pub mod scenes;
pub mod tiles;

pub use metrics::{api_metrics_handler, favicon_handler, health_handler, metrics_handler};
pub use scenes::{bounds_handler, metadata_handler, search_handler};
pub use tiles::{band_tile_handler, ratio_tile_handler};
