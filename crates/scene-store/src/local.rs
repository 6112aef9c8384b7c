//! Scene store backed by a local directory tree.
//!
//! ```text
//! <data_dir>/<scene>/scene.json              {"bounds": [west, south, east, north]}
//! <data_dir>/<scene>/<z>/<x>/<y>/B<band>.png 8- or 16-bit grayscale band tile
//! <data_dir>/<scene>/overview/B<band>.png    reduced-resolution band, for statistics
//! ```
//!
//! Zero is the no-data value. A tile inside the scene footprint with no
//! tile directory comes back empty and fully masked.

use async_trait::async_trait;
use image::DynamicImage;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, instrument, warn};

use tiler_common::{
    BoundingBox, PixelBuffer, SceneId, TileCoord, TilerError, TilerResult, ValidityMask,
};

use crate::stats::{band_statistics, validate_percentiles};
use crate::{
    BandTile, CatalogSearch, RasterSource, SceneBounds, SceneDescriptor, SceneMetadata,
    SceneMetadataService,
};

/// Contents of `scene.json`.
#[derive(Debug, Deserialize)]
struct SceneManifest {
    bounds: [f64; 4],
}

/// A decoded grayscale band image.
struct BandImage {
    width: usize,
    height: usize,
    samples: Vec<u16>,
}

#[derive(Debug, Clone)]
pub struct LocalSceneStore {
    root: PathBuf,
}

impl LocalSceneStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Parse the scene id and locate its directory.
    async fn open_scene(&self, scene: &str) -> TilerResult<(SceneId, PathBuf)> {
        let id = SceneId::parse(scene).map_err(|_| TilerError::SceneNotFound(scene.to_string()))?;
        // The id must name exactly one directory directly under the root.
        let mut components = Path::new(scene).components();
        if !matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        ) {
            warn!(scene, "Rejected scene id that is not a single path component");
            return Err(TilerError::SceneNotFound(scene.to_string()));
        }
        let dir = self.root.join(scene);
        match tokio::fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => Ok((id, dir)),
            Ok(_) => Err(TilerError::SceneNotFound(scene.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(TilerError::SceneNotFound(scene.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn read_bounds(&self, scene: &str, dir: &Path) -> TilerResult<BoundingBox> {
        let raw = match tokio::fs::read(dir.join("scene.json")).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(TilerError::DataReadError(format!(
                    "scene '{}' has no scene.json",
                    scene
                )))
            }
            Err(e) => return Err(e.into()),
        };
        let manifest: SceneManifest = serde_json::from_slice(&raw)?;
        BoundingBox::from_array(manifest.bounds)
    }

    /// Read and decode one band file; `None` if the file does not exist.
    async fn read_band(path: PathBuf) -> TilerResult<Option<BandImage>> {
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let image = tokio::task::spawn_blocking(move || decode_band(&bytes, &path))
            .await
            .map_err(|e| TilerError::InternalError(format!("band decode task failed: {}", e)))??;
        Ok(Some(image))
    }
}

fn decode_band(bytes: &[u8], path: &Path) -> TilerResult<BandImage> {
    let image = image::load_from_memory(bytes).map_err(|e| {
        TilerError::DataReadError(format!("failed to decode {}: {}", path.display(), e))
    })?;
    let (width, height) = (image.width() as usize, image.height() as usize);
    let samples = match image {
        DynamicImage::ImageLuma8(img) => img.into_raw().into_iter().map(u16::from).collect(),
        DynamicImage::ImageLuma16(img) => img.into_raw(),
        other => {
            return Err(TilerError::DataReadError(format!(
                "{} is {:?}, expected grayscale",
                path.display(),
                other.color()
            )))
        }
    };
    Ok(BandImage {
        width,
        height,
        samples,
    })
}

/// Nearest-neighbour resample to `size` x `size`.
fn resample_nearest(image: &BandImage, size: usize) -> Vec<u16> {
    if image.width == size && image.height == size {
        return image.samples.clone();
    }
    let mut out = Vec::with_capacity(size * size);
    for row in 0..size {
        let src_row = row * image.height / size;
        for col in 0..size {
            let src_col = col * image.width / size;
            out.push(image.samples[src_row * image.width + src_col]);
        }
    }
    out
}

#[async_trait]
impl RasterSource for LocalSceneStore {
    #[instrument(skip(self), fields(root = %self.root.display()))]
    async fn fetch_tile(
        &self,
        scene: &str,
        bands: &[String],
        tile: TileCoord,
        tile_size: usize,
    ) -> TilerResult<BandTile> {
        let (id, dir) = self.open_scene(scene).await?;
        let footprint = self.read_bounds(scene, &dir).await?;
        if !footprint.intersects(&tile.latlon_bounds()) {
            return Err(TilerError::TileOutsideBounds(format!("{} of {}", tile, scene)));
        }
        for band in bands {
            id.require_band(band)?;
        }

        let tile_dir = dir
            .join(tile.z.to_string())
            .join(tile.x.to_string())
            .join(tile.y.to_string());
        match tokio::fs::metadata(&tile_dir).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(%tile, "No tile data, returning empty tile");
                let data = PixelBuffer::zeros(bands.len(), tile_size, tile_size);
                let mask = ValidityMask::from_nonzero_bands(&data);
                return Ok(BandTile { data, mask });
            }
            Err(e) => return Err(e.into()),
        }

        let mut planes = Vec::with_capacity(bands.len());
        for band in bands {
            let image = Self::read_band(tile_dir.join(format!("B{}.png", band)))
                .await?
                .ok_or_else(|| TilerError::BandNotFound {
                    scene: scene.to_string(),
                    band: band.clone(),
                })?;
            planes.push(resample_nearest(&image, tile_size));
        }

        let data = PixelBuffer::from_planes(planes, tile_size, tile_size)?;
        let mask = ValidityMask::from_nonzero_bands(&data);
        debug!(%tile, valid = mask.count_valid(), "Fetched band tile");
        Ok(BandTile { data, mask })
    }
}

#[async_trait]
impl SceneMetadataService for LocalSceneStore {
    #[instrument(skip(self))]
    async fn bounds(&self, scene: &str) -> TilerResult<SceneBounds> {
        let (_, dir) = self.open_scene(scene).await?;
        let bounds = self.read_bounds(scene, &dir).await?;
        Ok(SceneBounds {
            sceneid: scene.to_string(),
            bounds: bounds.to_array(),
        })
    }

    #[instrument(skip(self))]
    async fn metadata(&self, scene: &str, pmin: f64, pmax: f64) -> TilerResult<SceneMetadata> {
        validate_percentiles(pmin, pmax)?;
        let (id, dir) = self.open_scene(scene).await?;
        let bounds = self.read_bounds(scene, &dir).await?;

        let mut statistics = BTreeMap::new();
        for band in id.instrument.bands() {
            let path = dir.join("overview").join(format!("B{}.png", band));
            let Some(image) = Self::read_band(path).await? else {
                continue;
            };
            match band_statistics(&image.samples, pmin, pmax) {
                Some(stats) => {
                    statistics.insert(band.to_string(), stats);
                }
                None => warn!(scene, band, "Overview has no valid samples"),
            }
        }

        Ok(SceneMetadata {
            sceneid: scene.to_string(),
            bounds: bounds.to_array(),
            statistics,
        })
    }
}

#[async_trait]
impl CatalogSearch for LocalSceneStore {
    #[instrument(skip(self))]
    async fn search(&self, path: u32, row: u32) -> TilerResult<Vec<SceneDescriptor>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut found = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let Ok(id) = SceneId::parse(name) else {
                continue;
            };
            if id.path == path && id.row == row {
                found.push(id);
            }
        }

        found.sort_by(|a, b| {
            a.acquisition_date
                .cmp(&b.acquisition_date)
                .then_with(|| a.scene_id.cmp(&b.scene_id))
        });
        Ok(found.into_iter().map(SceneDescriptor::from).collect())
    }
}
