//! Shared response helpers.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::{error, warn};

use tiler_common::TilerError;

use crate::pipeline::EncodedTile;

/// JSON error body with the status mapped from the error.
pub fn error_response(err: &TilerError) -> Response {
    let status = StatusCode::from_u16(err.http_status_code())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        error!(error = %err, code = err.error_code(), "Request failed");
    } else {
        warn!(error = %err, code = err.error_code(), "Request rejected");
    }

    let body = serde_json::json!({
        "code": err.error_code(),
        "message": err.to_string(),
    });
    (status, Json(body)).into_response()
}

/// Image bytes with `image/<format>` content type.
pub fn image_response(tile: EncodedTile) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, tile.format.mime_type()),
            (header::CACHE_CONTROL, "max-age=3600"),
        ],
        tile.bytes,
    )
        .into_response()
}
