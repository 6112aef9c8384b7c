//! Tile pipeline orchestration.
//!
//! Every request is validated completely before the raster source is
//! touched: a bad band list, histogram cut, ratio name, range, colormap or
//! tile size never costs a fetch. The fetch runs under a timeout; the pixel
//! stages and encoding run on the blocking pool.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use renderer::{
    encode, render_bands, render_ratio, BandSelection, ColorTable, ColorTableSet, EncoderOptions,
    RatioDefinition, RatioRegistry, RenderedTile, ValueRange,
};
use renderer::bands::parse_tile_size;
use scene_store::{BandTile, RasterSource};
use tiler_common::{TileCoord, TileFormat, TilerError, TilerResult};

use crate::metrics::{MetricsCollector, TileKind, Timer};

/// A direct-band tile request, as received.
#[derive(Debug, Clone)]
pub struct BandTileRequest {
    pub scene: String,
    pub tile: TileCoord,
    pub format: TileFormat,
    pub rgb: Option<String>,
    pub histo: Option<String>,
    pub tile_size: Option<String>,
}

/// A ratio tile request, as received.
#[derive(Debug, Clone)]
pub struct RatioTileRequest {
    pub scene: String,
    pub tile: TileCoord,
    pub format: TileFormat,
    pub ratio: Option<String>,
    pub range: Option<String>,
    pub colormap: Option<String>,
    pub tile_size: Option<String>,
}

/// Encoded image bytes.
#[derive(Debug, Clone)]
pub struct EncodedTile {
    pub bytes: Vec<u8>,
    pub format: TileFormat,
}

/// A validated ratio request, ready to fetch.
struct RatioPlan {
    ratio: RatioDefinition,
    range: ValueRange,
    table: ColorTable,
    bands: Vec<String>,
    tile_size: usize,
}

pub struct TilePipeline {
    source: Arc<dyn RasterSource>,
    ratios: Arc<RatioRegistry>,
    colormaps: Arc<ColorTableSet>,
    encoder: EncoderOptions,
    fetch_timeout: Duration,
    max_tile_size: usize,
    metrics: Arc<MetricsCollector>,
}

impl TilePipeline {
    pub fn new(
        source: Arc<dyn RasterSource>,
        ratios: Arc<RatioRegistry>,
        colormaps: Arc<ColorTableSet>,
        encoder: EncoderOptions,
        fetch_timeout: Duration,
        max_tile_size: usize,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            source,
            ratios,
            colormaps,
            encoder,
            fetch_timeout,
            max_tile_size,
            metrics,
        }
    }

    /// Validate → fetch → rescale per band → mask → encode.
    #[instrument(skip(self, request), fields(scene = %request.scene, tile = %request.tile))]
    pub async fn band_tile(&self, request: BandTileRequest) -> TilerResult<EncodedTile> {
        request.tile.validate()?;
        let selection =
            BandSelection::from_query(request.rgb.as_deref(), request.histo.as_deref())?;
        let tile_size = parse_tile_size(request.tile_size.as_deref(), self.max_tile_size)?;

        let fetched = self
            .fetch(&request.scene, selection.bands.as_slice(), request.tile, tile_size)
            .await?;

        let format = request.format;
        let encoder = self.encoder;
        let (rendered, render_us, bytes, encode_us) = run_blocking(move || {
            let timer = Timer::start();
            let rendered = render_bands(&fetched.data, &fetched.mask, &selection)?;
            let render_us = timer.elapsed_us();
            let timer = Timer::start();
            let bytes = encode(&rendered.pixels, &rendered.mask, format, None, &encoder)?;
            Ok((rendered, render_us, bytes, timer.elapsed_us()))
        })
        .await?;

        self.finish(TileKind::Bands, &rendered, render_us, encode_us).await;
        Ok(EncodedTile { bytes, format })
    }

    /// Validate → fetch → evaluate → rescale → mask → colormap → encode.
    #[instrument(skip(self, request), fields(scene = %request.scene, tile = %request.tile))]
    pub async fn ratio_tile(&self, request: RatioTileRequest) -> TilerResult<EncodedTile> {
        let plan = self.plan_ratio(&request)?;

        let fetched = self
            .fetch(&request.scene, &plan.bands, request.tile, plan.tile_size)
            .await?;

        let format = request.format;
        let encoder = self.encoder;
        let (rendered, render_us, bytes, encode_us) = run_blocking(move || {
            let timer = Timer::start();
            let rendered = render_ratio(
                &fetched.data,
                &fetched.mask,
                &plan.ratio,
                plan.range,
                &plan.table,
            )?;
            let render_us = timer.elapsed_us();
            let timer = Timer::start();
            let bytes = encode(&rendered.pixels, &rendered.mask, format, None, &encoder)?;
            Ok((rendered, render_us, bytes, timer.elapsed_us()))
        })
        .await?;

        self.finish(TileKind::Ratio, &rendered, render_us, encode_us).await;
        Ok(EncodedTile { bytes, format })
    }

    fn plan_ratio(&self, request: &RatioTileRequest) -> TilerResult<RatioPlan> {
        request.tile.validate()?;
        let name = request
            .ratio
            .as_deref()
            .ok_or_else(|| TilerError::MissingParameter("ratio".to_string()))?;
        let ratio = self.ratios.lookup(name)?.clone();
        let range = match request.range.as_deref() {
            Some(raw) => ValueRange::parse("range", raw)?,
            None => ratio.output_range,
        };
        let table_name = request.colormap.as_deref().unwrap_or(&ratio.colormap);
        let table = self.colormaps.get(table_name)?.clone();
        let bands = ratio.band_spec()?.as_slice().to_vec();
        let tile_size = parse_tile_size(request.tile_size.as_deref(), self.max_tile_size)?;

        Ok(RatioPlan {
            ratio,
            range,
            table,
            bands,
            tile_size,
        })
    }

    async fn fetch(
        &self,
        scene: &str,
        bands: &[String],
        tile: TileCoord,
        tile_size: usize,
    ) -> TilerResult<BandTile> {
        let timer = Timer::start();
        let fetched = tokio::time::timeout(
            self.fetch_timeout,
            self.source.fetch_tile(scene, bands, tile, tile_size),
        )
        .await
        .map_err(|_| TilerError::Timeout)??;
        self.metrics.record_fetch(timer.elapsed_us()).await;
        Ok(fetched)
    }

    async fn finish(&self, kind: TileKind, rendered: &RenderedTile, render_us: u64, encode_us: u64) {
        self.metrics.record_render(kind, render_us).await;
        self.metrics.record_encode(encode_us).await;
        debug!(
            kind = kind.label(),
            valid = rendered.mask.count_valid(),
            render_us,
            encode_us,
            "Rendered tile"
        );
    }
}

async fn run_blocking<T, F>(f: F) -> TilerResult<T>
where
    F: FnOnce() -> TilerResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| TilerError::InternalError(format!("render task failed: {}", e)))?
}
