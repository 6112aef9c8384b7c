//! Tile pipeline tests against an in-memory raster source.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use renderer::{ColorTableSet, EncoderOptions, RatioRegistry};
use scene_store::{BandTile, RasterSource};
use test_utils::MUX_SCENE;
use tiler_api::metrics::MetricsCollector;
use tiler_api::pipeline::{BandTileRequest, RatioTileRequest, TilePipeline};
use tiler_common::{PixelBuffer, TileCoord, TileFormat, TilerError, TilerResult, ValidityMask};

/// Serves constant band planes and counts fetches.
struct MockSource {
    values: HashMap<String, u16>,
    delay: Option<Duration>,
    fetches: AtomicUsize,
}

impl MockSource {
    fn new(values: &[(&str, u16)]) -> Self {
        Self {
            values: values.iter().map(|(b, v)| (b.to_string(), *v)).collect(),
            delay: None,
            fetches: AtomicUsize::new(0),
        }
    }

    fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RasterSource for MockSource {
    async fn fetch_tile(
        &self,
        _scene: &str,
        bands: &[String],
        _tile: TileCoord,
        tile_size: usize,
    ) -> TilerResult<BandTile> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let planes = bands
            .iter()
            .map(|band| {
                let value = self.values.get(band).copied().unwrap_or(0);
                let mut plane = vec![value; tile_size * tile_size];
                // first pixel is always nodata
                plane[0] = 0;
                plane
            })
            .collect();
        let data = PixelBuffer::from_planes(planes, tile_size, tile_size)?;
        let mask = ValidityMask::from_nonzero_bands(&data);
        Ok(BandTile { data, mask })
    }
}

fn pipeline(source: Arc<MockSource>, timeout: Duration) -> (TilePipeline, Arc<MetricsCollector>) {
    let metrics = Arc::new(MetricsCollector::new());
    let pipeline = TilePipeline::new(
        source,
        Arc::new(RatioRegistry::builtin()),
        Arc::new(ColorTableSet::builtin()),
        EncoderOptions::default(),
        timeout,
        1024,
        metrics.clone(),
    );
    (pipeline, metrics)
}

fn mux_source() -> Arc<MockSource> {
    Arc::new(MockSource::new(&[("5", 400), ("6", 600), ("7", 1000), ("8", 3000)]))
}

fn band_request(rgb: Option<&str>, histo: Option<&str>, tile: Option<&str>) -> BandTileRequest {
    BandTileRequest {
        scene: MUX_SCENE.to_string(),
        tile: TileCoord::new(3, 2, 5),
        format: TileFormat::Png,
        rgb: rgb.map(String::from),
        histo: histo.map(String::from),
        tile_size: tile.map(String::from),
    }
}

fn ratio_request(ratio: Option<&str>) -> RatioTileRequest {
    RatioTileRequest {
        scene: MUX_SCENE.to_string(),
        tile: TileCoord::new(3, 2, 5),
        format: TileFormat::Png,
        ratio: ratio.map(String::from),
        range: None,
        colormap: None,
        tile_size: Some("8".to_string()),
    }
}

// ============================================================================
// Band tiles
// ============================================================================

#[tokio::test]
async fn test_band_tile_default_bands() {
    let source = mux_source();
    let (pipeline, metrics) = pipeline(source.clone(), Duration::from_secs(5));

    let tile = pipeline
        .band_tile(band_request(None, Some("0,1000;0,1000;0,1000"), Some("8")))
        .await
        .unwrap();
    assert_eq!(tile.format, TileFormat::Png);

    let decoded = image::load_from_memory(&tile.bytes).unwrap().to_rgba8();
    assert_eq!(decoded.dimensions(), (8, 8));
    // bands 7,6,5 at 1000/600/400 on a 0..1000 stretch
    assert_eq!(decoded.get_pixel(1, 0).0, [255, 153, 102, 255]);
    assert_eq!(decoded.get_pixel(0, 0).0[3], 0);

    assert_eq!(source.fetches(), 1);
    assert_eq!(metrics.snapshot().await.fetch.count, 1);
}

#[tokio::test]
async fn test_band_tile_default_size() {
    let (pipeline, _) = pipeline(mux_source(), Duration::from_secs(5));
    let tile = pipeline.band_tile(band_request(Some("8"), None, None)).await.unwrap();
    let decoded = image::load_from_memory(&tile.bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (256, 256));
}

#[tokio::test]
async fn test_band_tile_rejects_before_fetch() {
    let source = mux_source();
    let (pipeline, _) = pipeline(source.clone(), Duration::from_secs(5));

    let cases = [
        band_request(Some("7,6,5"), Some("0,255"), None),
        band_request(Some("7,6,5"), Some("0,255;0,255;300,300"), None),
        band_request(None, None, Some("2048")),
        band_request(None, None, Some("0")),
        band_request(Some(""), None, None),
    ];
    for request in cases {
        let err = pipeline.band_tile(request).await.unwrap_err();
        assert!(err.is_client_error(), "unexpected error {:?}", err);
    }

    let mut out_of_matrix = band_request(None, None, None);
    out_of_matrix.tile = TileCoord::new(1, 2, 0);
    assert!(pipeline.band_tile(out_of_matrix).await.is_err());

    assert_eq!(source.fetches(), 0);
}

// ============================================================================
// Ratio tiles
// ============================================================================

#[tokio::test]
async fn test_ratio_tile_colormapped_with_alpha() {
    let source = mux_source();
    let (pipeline, _) = pipeline(source.clone(), Duration::from_secs(5));

    let tile = pipeline.ratio_tile(ratio_request(Some("ndvi"))).await.unwrap();
    let decoded = image::load_from_memory(&tile.bytes).unwrap().to_rgba8();
    assert_eq!(decoded.dimensions(), (8, 8));
    assert_eq!(decoded.get_pixel(0, 0).0, [0, 0, 0, 0]);
    assert_eq!(decoded.get_pixel(3, 3).0[3], 255);
    assert_eq!(source.fetches(), 1);
}

#[tokio::test]
async fn test_ratio_name_is_case_insensitive() {
    let (pipeline, _) = pipeline(mux_source(), Duration::from_secs(5));
    assert!(pipeline.ratio_tile(ratio_request(Some("NDVI"))).await.is_ok());
}

#[tokio::test]
async fn test_ratio_tile_rejects_before_fetch() {
    let source = mux_source();
    let (pipeline, _) = pipeline(source.clone(), Duration::from_secs(5));

    let err = pipeline.ratio_tile(ratio_request(None)).await.unwrap_err();
    assert!(matches!(err, TilerError::MissingParameter(ref p) if p == "ratio"));

    let err = pipeline.ratio_tile(ratio_request(Some("evi"))).await.unwrap_err();
    assert!(matches!(err, TilerError::UnknownRatio(_)));

    let mut request = ratio_request(Some("ndvi"));
    request.colormap = Some("jet".to_string());
    let err = pipeline.ratio_tile(request).await.unwrap_err();
    assert!(matches!(err, TilerError::UnknownColormap(_)));

    let mut request = ratio_request(Some("ndvi"));
    request.range = Some("1,1".to_string());
    assert!(pipeline.ratio_tile(request).await.is_err());

    assert_eq!(source.fetches(), 0);
}

// ============================================================================
// Fetch timeout
// ============================================================================

#[tokio::test]
async fn test_slow_fetch_times_out() {
    let source = Arc::new(
        MockSource::new(&[("7", 1000), ("8", 3000)]).slow(Duration::from_millis(500)),
    );
    let (pipeline, _) = pipeline(source.clone(), Duration::from_millis(20));

    let err = pipeline.ratio_tile(ratio_request(Some("ndvi"))).await.unwrap_err();
    assert!(matches!(err, TilerError::Timeout));
    assert_eq!(err.http_status_code(), 504);
    assert_eq!(source.fetches(), 1);
}
