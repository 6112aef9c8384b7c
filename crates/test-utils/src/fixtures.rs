//! On-disk scene fixtures in the local scene store layout.

use image::{ImageBuffer, Luma};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A CBERS-4 MUX scene id (path 57, row 94).
pub const MUX_SCENE: &str = "CBERS_4_MUX_20171121_057_094_L2";

/// An AWFI scene over the same path/row, acquired later.
pub const AWFI_SCENE: &str = "CBERS_4_AWFI_20180103_057_094_L2";

/// Footprint that intersects every web mercator tile.
pub const WORLD_BOUNDS: [f64; 4] = [-180.0, -85.0, 180.0, 85.0];

/// A scene data directory that is deleted when dropped.
pub struct SceneFixture {
    dir: TempDir,
}

impl SceneFixture {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp dir"),
        }
    }

    /// The data directory to hand to the store.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Create `<scene>/scene.json`.
    pub fn add_scene(&self, scene: &str, bounds: [f64; 4]) -> PathBuf {
        let dir = self.root().join(scene);
        fs::create_dir_all(&dir).expect("create scene dir");
        let manifest = serde_json::json!({ "bounds": bounds });
        fs::write(dir.join("scene.json"), manifest.to_string()).expect("write scene.json");
        dir
    }

    /// Write a 16-bit band tile at `<scene>/<z>/<x>/<y>/B<band>.png`.
    pub fn write_band_tile(
        &self,
        scene: &str,
        (z, x, y): (u32, u32, u32),
        band: &str,
        size: usize,
        samples: Vec<u16>,
    ) -> PathBuf {
        let dir = self
            .root()
            .join(scene)
            .join(z.to_string())
            .join(x.to_string())
            .join(y.to_string());
        write_png16(&dir, band, size, size, samples)
    }

    /// Write an 8-bit band tile.
    pub fn write_band_tile_u8(
        &self,
        scene: &str,
        (z, x, y): (u32, u32, u32),
        band: &str,
        size: usize,
        samples: Vec<u8>,
    ) -> PathBuf {
        let dir = self
            .root()
            .join(scene)
            .join(z.to_string())
            .join(x.to_string())
            .join(y.to_string());
        fs::create_dir_all(&dir).expect("create tile dir");
        let path = dir.join(format!("B{}.png", band));
        let image: ImageBuffer<Luma<u8>, Vec<u8>> =
            ImageBuffer::from_raw(size as u32, size as u32, samples).expect("sample count");
        image.save(&path).expect("write band tile");
        path
    }

    /// Write `<scene>/overview/B<band>.png`.
    pub fn write_overview(
        &self,
        scene: &str,
        band: &str,
        width: usize,
        height: usize,
        samples: Vec<u16>,
    ) -> PathBuf {
        let dir = self.root().join(scene).join("overview");
        write_png16(&dir, band, width, height, samples)
    }
}

impl Default for SceneFixture {
    fn default() -> Self {
        Self::new()
    }
}

fn write_png16(dir: &Path, band: &str, width: usize, height: usize, samples: Vec<u16>) -> PathBuf {
    fs::create_dir_all(dir).expect("create band dir");
    let path = dir.join(format!("B{}.png", band));
    let image: ImageBuffer<Luma<u16>, Vec<u16>> =
        ImageBuffer::from_raw(width as u32, height as u32, samples).expect("sample count");
    image.save(&path).expect("write band png");
    path
}
