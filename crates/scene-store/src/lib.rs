//! Access to scene rasters, scene metadata and the scene catalog.
//!
//! The tile pipeline only depends on the traits defined here. The
//! [`LocalSceneStore`] implementation reads pre-tiled band PNGs from a
//! directory tree.

pub mod local;
pub mod stats;

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;

use tiler_common::{PixelBuffer, SceneId, TileCoord, TilerResult, ValidityMask};

pub use local::LocalSceneStore;
pub use stats::BandStatistics;

/// Band samples for one tile and where they hold data.
#[derive(Debug, Clone)]
pub struct BandTile {
    pub data: PixelBuffer<u16>,
    pub mask: ValidityMask,
}

/// Reads band samples for a tile.
#[async_trait]
pub trait RasterSource: Send + Sync {
    /// Bands are returned in the order requested, resampled to
    /// `tile_size` x `tile_size`.
    async fn fetch_tile(
        &self,
        scene: &str,
        bands: &[String],
        tile: TileCoord,
        tile_size: usize,
    ) -> TilerResult<BandTile>;
}

/// Scene footprint and per-band statistics.
#[async_trait]
pub trait SceneMetadataService: Send + Sync {
    async fn bounds(&self, scene: &str) -> TilerResult<SceneBounds>;

    /// Statistics with the `pmin`/`pmax` percentiles.
    async fn metadata(&self, scene: &str, pmin: f64, pmax: f64) -> TilerResult<SceneMetadata>;
}

/// Lists scenes for a WRS path/row.
#[async_trait]
pub trait CatalogSearch: Send + Sync {
    async fn search(&self, path: u32, row: u32) -> TilerResult<Vec<SceneDescriptor>>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneBounds {
    pub sceneid: String,
    /// `[west, south, east, north]`
    pub bounds: [f64; 4],
}

#[derive(Debug, Clone, Serialize)]
pub struct SceneMetadata {
    pub sceneid: String,
    pub bounds: [f64; 4],
    pub statistics: BTreeMap<String, BandStatistics>,
}

/// A catalog hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneDescriptor {
    #[serde(flatten)]
    pub scene: SceneId,
    pub key: String,
}

impl From<SceneId> for SceneDescriptor {
    fn from(scene: SceneId) -> Self {
        let key = scene.key();
        Self { scene, key }
    }
}
