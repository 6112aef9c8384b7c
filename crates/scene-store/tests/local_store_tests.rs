//! Tests for the local directory scene store.

use scene_store::{CatalogSearch, LocalSceneStore, RasterSource, SceneMetadataService};
use test_utils::{
    assert_approx_eq, constant_plane, gradient_plane, with_nodata_hole, SceneFixture, AWFI_SCENE,
    MUX_SCENE, WORLD_BOUNDS,
};
use tiler_common::{TileCoord, TilerError};

fn bands(list: &[&str]) -> Vec<String> {
    list.iter().map(|b| b.to_string()).collect()
}

// ============================================================================
// Tile fetch
// ============================================================================

#[tokio::test]
async fn test_fetch_tile_band_order_and_mask() {
    let fixture = SceneFixture::new();
    fixture.add_scene(MUX_SCENE, WORLD_BOUNDS);
    let red = with_nodata_hole(constant_plane(4, 4, 700), 4, (0, 0), (2, 1));
    fixture.write_band_tile(MUX_SCENE, (2, 1, 1), "7", 4, red);
    fixture.write_band_tile(MUX_SCENE, (2, 1, 1), "6", 4, constant_plane(4, 4, 600));

    let store = LocalSceneStore::new(fixture.root());
    let tile = store
        .fetch_tile(MUX_SCENE, &bands(&["6", "7"]), TileCoord::new(2, 1, 1), 4)
        .await
        .unwrap();

    assert_eq!(tile.data.shape(), (2, 4, 4));
    assert!(tile.data.band(0).iter().all(|&v| v == 600));
    assert_eq!(tile.data.band(1)[0], 0);
    assert_eq!(tile.mask.count_valid(), 14);
    assert!(!tile.mask.is_valid(0));
    assert!(!tile.mask.is_valid(1));
}

#[tokio::test]
async fn test_fetch_tile_resamples_to_tile_size() {
    let fixture = SceneFixture::new();
    fixture.add_scene(MUX_SCENE, WORLD_BOUNDS);
    fixture.write_band_tile(MUX_SCENE, (1, 0, 0), "8", 2, vec![1, 2, 3, 4]);

    let store = LocalSceneStore::new(fixture.root());
    let tile = store
        .fetch_tile(MUX_SCENE, &bands(&["8"]), TileCoord::new(1, 0, 0), 4)
        .await
        .unwrap();
    assert_eq!(tile.data.band(0), &[1, 1, 2, 2, 1, 1, 2, 2, 3, 3, 4, 4, 3, 3, 4, 4]);
}

#[tokio::test]
async fn test_fetch_tile_reads_8bit_bands() {
    let fixture = SceneFixture::new();
    fixture.add_scene(MUX_SCENE, WORLD_BOUNDS);
    fixture.write_band_tile_u8(MUX_SCENE, (0, 0, 0), "5", 2, vec![10, 20, 30, 0]);

    let store = LocalSceneStore::new(fixture.root());
    let tile = store
        .fetch_tile(MUX_SCENE, &bands(&["5"]), TileCoord::new(0, 0, 0), 2)
        .await
        .unwrap();
    assert_eq!(tile.data.band(0), &[10, 20, 30, 0]);
    assert_eq!(tile.mask.as_slice(), &[true, true, true, false]);
}

#[tokio::test]
async fn test_missing_tile_directory_is_empty_tile() {
    let fixture = SceneFixture::new();
    fixture.add_scene(MUX_SCENE, WORLD_BOUNDS);

    let store = LocalSceneStore::new(fixture.root());
    let tile = store
        .fetch_tile(MUX_SCENE, &bands(&["7", "6", "5"]), TileCoord::new(3, 2, 2), 8)
        .await
        .unwrap();
    assert_eq!(tile.data.shape(), (3, 8, 8));
    assert_eq!(tile.mask.count_valid(), 0);
}

// ============================================================================
// Fetch errors
// ============================================================================

#[tokio::test]
async fn test_unknown_scene() {
    let fixture = SceneFixture::new();
    let store = LocalSceneStore::new(fixture.root());

    let err = store
        .fetch_tile(MUX_SCENE, &bands(&["7"]), TileCoord::new(0, 0, 0), 256)
        .await
        .unwrap_err();
    assert!(matches!(err, TilerError::SceneNotFound(_)));

    let err = store
        .fetch_tile("not-a-scene", &bands(&["7"]), TileCoord::new(0, 0, 0), 256)
        .await
        .unwrap_err();
    assert!(matches!(err, TilerError::SceneNotFound(_)));
}

#[tokio::test]
async fn test_tile_outside_scene() {
    let fixture = SceneFixture::new();
    fixture.add_scene(MUX_SCENE, [-52.0, -20.0, -51.0, -19.0]);
    let store = LocalSceneStore::new(fixture.root());

    // z1 (1, 0) is the north-east quadrant
    let err = store
        .fetch_tile(MUX_SCENE, &bands(&["7"]), TileCoord::new(1, 1, 0), 256)
        .await
        .unwrap_err();
    assert!(matches!(err, TilerError::TileOutsideBounds(_)));
}

#[tokio::test]
async fn test_band_not_in_instrument() {
    let fixture = SceneFixture::new();
    fixture.add_scene(MUX_SCENE, WORLD_BOUNDS);
    let store = LocalSceneStore::new(fixture.root());

    let err = store
        .fetch_tile(MUX_SCENE, &bands(&["13"]), TileCoord::new(0, 0, 0), 256)
        .await
        .unwrap_err();
    assert!(matches!(err, TilerError::BandNotFound { ref band, .. } if band == "13"));
}

#[tokio::test]
async fn test_band_file_missing() {
    let fixture = SceneFixture::new();
    fixture.add_scene(MUX_SCENE, WORLD_BOUNDS);
    fixture.write_band_tile(MUX_SCENE, (0, 0, 0), "7", 2, constant_plane(2, 2, 5));
    let store = LocalSceneStore::new(fixture.root());

    let err = store
        .fetch_tile(MUX_SCENE, &bands(&["7", "8"]), TileCoord::new(0, 0, 0), 2)
        .await
        .unwrap_err();
    assert!(matches!(err, TilerError::BandNotFound { ref band, .. } if band == "8"));
}

#[tokio::test]
async fn test_unreadable_tile_path_is_an_error() {
    let fixture = SceneFixture::new();
    let scene_dir = fixture.add_scene(MUX_SCENE, WORLD_BOUNDS);
    // A file where the x directory should be: looking up `<z>/<x>/<y>`
    // fails with something other than "not found".
    std::fs::create_dir_all(scene_dir.join("1")).unwrap();
    std::fs::write(scene_dir.join("1").join("0"), b"not a directory").unwrap();
    let store = LocalSceneStore::new(fixture.root());

    let err = store
        .fetch_tile(MUX_SCENE, &bands(&["7"]), TileCoord::new(1, 0, 0), 4)
        .await
        .unwrap_err();
    assert!(matches!(err, TilerError::InternalError(_)));
}

#[tokio::test]
async fn test_scene_id_cannot_escape_data_dir() {
    let fixture = SceneFixture::new();
    fixture.add_scene(&format!("data/{}", MUX_SCENE), WORLD_BOUNDS);
    fixture.add_scene("secret", [11.0, 22.0, 33.0, 44.0]);
    fixture.write_band_tile("secret", (0, 0, 0), "7", 2, constant_plane(2, 2, 9));
    fixture.write_overview("secret", "7", 2, 1, vec![5, 6]);
    let store = LocalSceneStore::new(fixture.root().join("data"));
    let escaped = format!("{}/../../secret", MUX_SCENE);

    let err = store.bounds(&escaped).await.unwrap_err();
    assert!(matches!(err, TilerError::SceneNotFound(_)));

    let err = store
        .fetch_tile(&escaped, &bands(&["7"]), TileCoord::new(0, 0, 0), 2)
        .await
        .unwrap_err();
    assert!(matches!(err, TilerError::SceneNotFound(_)));

    let err = store.metadata(&escaped, 2.0, 98.0).await.unwrap_err();
    assert!(matches!(err, TilerError::SceneNotFound(_)));

    // The legitimate scene next to it still resolves.
    assert!(store.bounds(MUX_SCENE).await.is_ok());
}

// ============================================================================
// Bounds and metadata
// ============================================================================

#[tokio::test]
async fn test_bounds() {
    let fixture = SceneFixture::new();
    fixture.add_scene(MUX_SCENE, [-52.0, -20.0, -51.0, -19.0]);
    let store = LocalSceneStore::new(fixture.root());

    let bounds = store.bounds(MUX_SCENE).await.unwrap();
    assert_eq!(bounds.sceneid, MUX_SCENE);
    assert_eq!(bounds.bounds, [-52.0, -20.0, -51.0, -19.0]);
}

#[tokio::test]
async fn test_metadata_statistics() {
    let fixture = SceneFixture::new();
    fixture.add_scene(MUX_SCENE, WORLD_BOUNDS);
    fixture.write_overview(MUX_SCENE, "7", 101, 1, gradient_plane(101, 1, 100, 200));
    fixture.write_overview(MUX_SCENE, "8", 2, 1, vec![0, 0]);
    let store = LocalSceneStore::new(fixture.root());

    let metadata = store.metadata(MUX_SCENE, 2.0, 98.0).await.unwrap();
    assert_eq!(metadata.bounds, WORLD_BOUNDS);
    assert_eq!(metadata.statistics.len(), 1);

    let red = &metadata.statistics["7"];
    assert_eq!(red.min, 100.0);
    assert_eq!(red.max, 200.0);
    assert_approx_eq!(red.pc[0], 102.0, 1e-9);
    assert_approx_eq!(red.pc[1], 198.0, 1e-9);
    assert_eq!(red.histogram.0.iter().sum::<u64>(), 101);
}

#[tokio::test]
async fn test_metadata_rejects_bad_percentiles() {
    let fixture = SceneFixture::new();
    fixture.add_scene(MUX_SCENE, WORLD_BOUNDS);
    let store = LocalSceneStore::new(fixture.root());

    let err = store.metadata(MUX_SCENE, 98.0, 2.0).await.unwrap_err();
    assert!(matches!(err, TilerError::Validation(_)));
}

// ============================================================================
// Search
// ============================================================================

#[tokio::test]
async fn test_search_by_path_row() {
    let fixture = SceneFixture::new();
    fixture.add_scene(AWFI_SCENE, WORLD_BOUNDS);
    fixture.add_scene(MUX_SCENE, WORLD_BOUNDS);
    fixture.add_scene("CBERS_4_MUX_20171121_058_094_L2", WORLD_BOUNDS);
    fixture.add_scene("scratch", WORLD_BOUNDS);
    let store = LocalSceneStore::new(fixture.root());

    let results = store.search(57, 94).await.unwrap();
    let ids: Vec<&str> = results.iter().map(|r| r.scene.scene_id.as_str()).collect();
    assert_eq!(ids, vec![MUX_SCENE, AWFI_SCENE]);
    assert_eq!(results[0].key, format!("CBERS4/MUX/057/094/{}", MUX_SCENE));

    assert!(store.search(1, 1).await.unwrap().is_empty());
}
