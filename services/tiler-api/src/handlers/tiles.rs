//! Tile endpoints.
//!
//! - `GET /tiles/:scene/:z/:x/:y.<ext>?rgb=&histo=&tile=`
//! - `GET /processing/:scene/:z/:x/:y.<ext>?ratio=&range=&colormap=&tile=`

use axum::{
    extract::{Extension, Path, Query},
    response::Response,
};
use serde::Deserialize;
use std::sync::Arc;

use tiler_common::format::parse_row_and_format;
use tiler_common::{TileCoord, TilerResult};

use super::common::{error_response, image_response};
use crate::metrics::TileKind;
use crate::pipeline::{BandTileRequest, EncodedTile, RatioTileRequest};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BandTileParams {
    pub rgb: Option<String>,
    pub histo: Option<String>,
    pub tile: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RatioTileParams {
    pub ratio: Option<String>,
    pub range: Option<String>,
    pub colormap: Option<String>,
    pub tile: Option<String>,
}

/// GET /tiles/:scene/:z/:x/:y.<ext>
pub async fn band_tile_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path((scene, z, x, y)): Path<(String, u32, u32, String)>,
    Query(params): Query<BandTileParams>,
) -> Response {
    state.metrics.record_request(TileKind::Bands);
    let result = async {
        let (y, format) = parse_row_and_format(&y)?;
        let request = BandTileRequest {
            scene,
            tile: TileCoord::new(z, x, y),
            format,
            rgb: params.rgb,
            histo: params.histo,
            tile_size: params.tile,
        };
        state.pipeline.band_tile(request).await
    }
    .await;
    respond(&state, TileKind::Bands, result).await
}

/// GET /processing/:scene/:z/:x/:y.<ext>
pub async fn ratio_tile_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path((scene, z, x, y)): Path<(String, u32, u32, String)>,
    Query(params): Query<RatioTileParams>,
) -> Response {
    state.metrics.record_request(TileKind::Ratio);
    let result = async {
        let (y, format) = parse_row_and_format(&y)?;
        let request = RatioTileRequest {
            scene,
            tile: TileCoord::new(z, x, y),
            format,
            ratio: params.ratio,
            range: params.range,
            colormap: params.colormap,
            tile_size: params.tile,
        };
        state.pipeline.ratio_tile(request).await
    }
    .await;
    respond(&state, TileKind::Ratio, result).await
}

async fn respond(state: &AppState, kind: TileKind, result: TilerResult<EncodedTile>) -> Response {
    match result {
        Ok(tile) => image_response(tile),
        Err(err) => {
            state.metrics.record_error(kind, err.error_code()).await;
            error_response(&err)
        }
    }
}
