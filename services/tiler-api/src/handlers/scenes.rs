//! Scene endpoints: footprint, band statistics and path/row search.

use axum::{
    extract::{Extension, Path, Query},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use tiler_common::scene::parse_path_row;
use tiler_common::{TilerError, TilerResult};

use super::common::error_response;
use crate::state::AppState;

const DEFAULT_PMIN: f64 = 2.0;
const DEFAULT_PMAX: f64 = 98.0;

#[derive(Debug, Deserialize)]
pub struct MetadataParams {
    pub pmin: Option<String>,
    pub pmax: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub path: Option<String>,
    pub row: Option<String>,
}

/// GET /bounds/:scene
pub async fn bounds_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(scene): Path<String>,
) -> Response {
    match state.scenes.bounds(&scene).await {
        Ok(bounds) => Json(bounds).into_response(),
        Err(err) => error_response(&err),
    }
}

/// GET /metadata/:scene?pmin=&pmax=
pub async fn metadata_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(scene): Path<String>,
    Query(params): Query<MetadataParams>,
) -> Response {
    let result = async {
        let pmin = parse_percentile("pmin", params.pmin.as_deref(), DEFAULT_PMIN)?;
        let pmax = parse_percentile("pmax", params.pmax.as_deref(), DEFAULT_PMAX)?;
        state.scenes.metadata(&scene, pmin, pmax).await
    }
    .await;

    match result {
        Ok(metadata) => Json(metadata).into_response(),
        Err(err) => error_response(&err),
    }
}

/// GET /search?path=&row=
pub async fn search_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Response {
    let result = async {
        let path = required(&params.path, "path")?;
        let row = required(&params.row, "row")?;
        let path = parse_path_row("path", path)?;
        let row = parse_path_row("row", row)?;
        let results = state.catalog.search(path, row).await?;
        Ok::<_, TilerError>((path, row, results))
    }
    .await;

    match result {
        Ok((path, row, results)) => Json(serde_json::json!({
            "request": { "path": path, "row": row },
            "meta": { "found": results.len() },
            "results": results,
        }))
        .into_response(),
        Err(err) => error_response(&err),
    }
}

fn required<'a>(value: &'a Option<String>, name: &str) -> TilerResult<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| TilerError::MissingParameter(name.to_string()))
}

fn parse_percentile(name: &str, raw: Option<&str>, default: f64) -> TilerResult<f64> {
    match raw {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| {
            TilerError::invalid_parameter(name, format!("'{}' is not a number", raw))
        }),
    }
}
