//! HTTP tests for the router, backed by an on-disk scene fixture.

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use std::sync::Arc;
use tower::ServiceExt;

use renderer::{ColorTableSet, RatioRegistry};
use scene_store::LocalSceneStore;
use test_utils::{
    constant_plane, gradient_plane, vegetation_planes, SceneFixture, AWFI_SCENE, MUX_SCENE,
    WORLD_BOUNDS,
};
use tiler_api::{build_router, AppState, Backends, TilerConfig};

const TILE: (u32, u32, u32) = (2, 1, 1);

fn app(fixture: &SceneFixture) -> (Router, Arc<AppState>) {
    let config = TilerConfig {
        data_dir: fixture.root().to_path_buf(),
        ..TilerConfig::default()
    };
    let state = Arc::new(AppState::with_backends(
        config,
        RatioRegistry::builtin(),
        ColorTableSet::builtin(),
        Backends::local(LocalSceneStore::new(fixture.root())),
    ));
    (build_router(state.clone()), state)
}

fn mux_fixture() -> SceneFixture {
    let fixture = SceneFixture::new();
    fixture.add_scene(MUX_SCENE, WORLD_BOUNDS);
    let (nir, red) = vegetation_planes(4, 4);
    fixture.write_band_tile(MUX_SCENE, TILE, "8", 4, nir);
    fixture.write_band_tile(MUX_SCENE, TILE, "7", 4, red);
    fixture.write_band_tile(MUX_SCENE, TILE, "6", 4, constant_plane(4, 4, 800));
    fixture.write_band_tile(MUX_SCENE, TILE, "5", 4, constant_plane(4, 4, 600));
    fixture
}

async fn get(app: Router, uri: &str) -> (StatusCode, Option<String>, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|v| v.to_str().unwrap().to_string());
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, content_type, body.to_vec())
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let (status, _, body) = get(app, uri).await;
    (status, serde_json::from_slice(&body).unwrap())
}

fn tile_uri(prefix: &str, ext: &str, query: &str) -> String {
    format!(
        "/{}/{}/{}/{}/{}.{}?{}",
        prefix, MUX_SCENE, TILE.0, TILE.1, TILE.2, ext, query
    )
}

// ============================================================================
// Band tiles
// ============================================================================

#[tokio::test]
async fn test_band_tile_png() {
    let fixture = mux_fixture();
    let (app, _) = app(&fixture);

    let uri = tile_uri("tiles", "png", "rgb=7,6,5&histo=0,1000;0,1000;0,1000&tile=4");
    let (status, content_type, body) = get(app, &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("image/png"));

    let decoded = image::load_from_memory(&body).unwrap().to_rgba8();
    assert_eq!(decoded.dimensions(), (4, 4));
    // band 7 is clamped at the 1000 cut, 800 and 600 stretch below it
    assert_eq!(decoded.get_pixel(0, 0).0, [255, 204, 153, 255]);
}

#[tokio::test]
async fn test_jpg_and_jpeg_are_identical() {
    let fixture = mux_fixture();
    let (app, _) = app(&fixture);

    let query = "rgb=7,6,5&histo=0,5000;0,5000;0,5000&tile=4";
    let (status, content_type, jpg) = get(app.clone(), &tile_uri("tiles", "jpg", query)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("image/jpeg"));

    let (_, content_type, jpeg) = get(app, &tile_uri("tiles", "jpeg", query)).await;
    assert_eq!(content_type.as_deref(), Some("image/jpeg"));
    assert_eq!(jpg, jpeg);
}

#[tokio::test]
async fn test_band_tile_webp() {
    let fixture = mux_fixture();
    let (app, _) = app(&fixture);

    let (status, content_type, body) =
        get(app, &tile_uri("tiles", "webp", "rgb=8&histo=0,5000&tile=4")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("image/webp"));
    assert_eq!(&body[0..4], b"RIFF");
}

#[tokio::test]
async fn test_band_tile_errors() {
    let fixture = mux_fixture();
    let (app, state) = app(&fixture);

    let (status, body) = get_json(app.clone(), &tile_uri("tiles", "gif", "tile=4")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "InvalidFormat");

    let (status, body) =
        get_json(app.clone(), &tile_uri("tiles", "png", "rgb=7,6,5&histo=0,255")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "ValidationError");

    let (status, body) = get_json(app.clone(), &tile_uri("tiles", "png", "rgb=13")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "BandNotFoundError");

    let (status, body) = get_json(
        app,
        "/tiles/CBERS_4_MUX_20200101_001_001_L2/2/1/1.png?tile=4",
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "SceneNotFoundError");

    let snapshot = state.metrics.snapshot().await;
    assert_eq!(snapshot.tile_requests, 4);
    assert_eq!(snapshot.tile_errors, 4);
}

#[tokio::test]
async fn test_tile_outside_footprint() {
    let fixture = SceneFixture::new();
    // a small footprint in the south-western quadrant
    fixture.add_scene(MUX_SCENE, [-60.0, -20.0, -50.0, -10.0]);
    let (app, _) = app(&fixture);

    let (status, body) = get_json(app, &format!("/tiles/{}/3/7/0.png", MUX_SCENE)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "TileOutsideBounds");
}

// ============================================================================
// Ratio tiles
// ============================================================================

#[tokio::test]
async fn test_ratio_tile_png() {
    let fixture = mux_fixture();
    let (app, state) = app(&fixture);

    let (status, content_type, body) =
        get(app, &tile_uri("processing", "png", "ratio=ndvi&tile=4")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("image/png"));
    let decoded = image::load_from_memory(&body).unwrap().to_rgba8();
    assert_eq!(decoded.dimensions(), (4, 4));
    assert!(decoded.pixels().all(|p| p.0[3] == 255));

    assert_eq!(state.metrics.snapshot().await.processing_requests, 1);
}

#[tokio::test]
async fn test_ratio_tile_errors() {
    let fixture = mux_fixture();
    let (app, _) = app(&fixture);

    let (status, body) = get_json(app.clone(), &tile_uri("processing", "png", "tile=4")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MissingParameterValue");

    let (status, body) =
        get_json(app.clone(), &tile_uri("processing", "png", "ratio=evi&tile=4")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "UnknownRatioError");

    let (status, body) = get_json(
        app,
        &tile_uri("processing", "png", "ratio=ndvi&colormap=nope&tile=4"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "UnknownColormapError");
}

// ============================================================================
// Scene endpoints
// ============================================================================

#[tokio::test]
async fn test_bounds() {
    let fixture = mux_fixture();
    let (app, _) = app(&fixture);

    let (status, body) = get_json(app, &format!("/bounds/{}", MUX_SCENE)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sceneid"], MUX_SCENE);
    assert_eq!(body["bounds"], serde_json::json!(WORLD_BOUNDS));
}

#[tokio::test]
async fn test_metadata() {
    let fixture = mux_fixture();
    fixture.write_overview(MUX_SCENE, "7", 10, 10, gradient_plane(10, 10, 1, 100));
    let (app, _) = app(&fixture);

    let (status, body) = get_json(app.clone(), &format!("/metadata/{}", MUX_SCENE)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sceneid"], MUX_SCENE);
    assert!(body["statistics"]["7"]["pc"].is_array());
    assert!(body["statistics"].get("8").is_none());

    let (status, body) =
        get_json(app, &format!("/metadata/{}?pmin=abc", MUX_SCENE)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "InvalidParameterValue");
}

#[tokio::test]
async fn test_search() {
    let fixture = mux_fixture();
    fixture.add_scene(AWFI_SCENE, WORLD_BOUNDS);
    let (app, _) = app(&fixture);

    let (status, body) = get_json(app.clone(), "/search?path=57&row=094").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["request"]["path"], 57);
    assert_eq!(body["request"]["row"], 94);
    assert_eq!(body["meta"]["found"], 2);
    assert_eq!(body["results"][0]["scene_id"], MUX_SCENE);
    assert_eq!(body["results"][1]["scene_id"], AWFI_SCENE);
    assert_eq!(
        body["results"][0]["key"],
        format!("CBERS4/MUX/057/094/{}", MUX_SCENE)
    );

    let (status, body) = get_json(app.clone(), "/search?path=58&row=94").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["found"], 0);

    let (status, body) = get_json(app, "/search?path=57").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MissingParameterValue");
}

// ============================================================================
// Health and metrics
// ============================================================================

#[tokio::test]
async fn test_health_and_favicon() {
    let fixture = SceneFixture::new();
    let (app, _) = app(&fixture);

    let (status, _, body) = get(app.clone(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"OK");

    let (status, _, body) = get(app, "/favicon.ico").await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_api_metrics_lists_products() {
    let fixture = SceneFixture::new();
    let (app, _) = app(&fixture);

    let (status, body) = get_json(app, "/api/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["metrics"]["tile_requests"], 0);
    let ratios = body["ratios"].as_array().unwrap();
    assert!(ratios.iter().any(|r| *r == "ndvi"));
    let colormaps = body["colormaps"].as_array().unwrap();
    assert!(colormaps.iter().any(|c| *c == "cfastie"));
}
