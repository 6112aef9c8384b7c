//! Service configuration: optional YAML file, then environment overrides.
//!
//! ```yaml
//! data_dir: /data/scenes
//! ratios_file: config/ratios.yaml
//! colormaps_file: config/colormaps.json
//! max_tile_size: 1024
//! fetch_timeout_ms: 10000
//! encoder:
//!   jpeg_quality: 90
//!   webp_quality: 85
//!   webp_lossless: false
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use renderer::encode::{DEFAULT_JPEG_QUALITY, DEFAULT_WEBP_QUALITY};
use renderer::EncoderOptions;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TilerConfig {
    /// Root of the local scene store.
    pub data_dir: PathBuf,
    /// Extra or overriding ratio definitions (YAML).
    pub ratios_file: Option<PathBuf>,
    /// Extra color tables (JSON).
    pub colormaps_file: Option<PathBuf>,
    /// Largest accepted `tile` size.
    pub max_tile_size: usize,
    pub fetch_timeout_ms: u64,
    pub encoder: EncoderConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    pub jpeg_quality: u8,
    pub webp_quality: f32,
    pub webp_lossless: bool,
}

impl Default for TilerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            ratios_file: None,
            colormaps_file: None,
            max_tile_size: 1024,
            fetch_timeout_ms: 10_000,
            encoder: EncoderConfig::default(),
        }
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            webp_quality: DEFAULT_WEBP_QUALITY,
            webp_lossless: false,
        }
    }
}

impl TilerConfig {
    /// Load from `path` if given, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                Self::from_yaml(&raw)
                    .with_context(|| format!("Failed to parse config file {}", path.display()))?
            }
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Override fields from `TILER_*`, `JPEG_QUALITY`, `WEBP_QUALITY` and
    /// `WEBP_LOSSLESS`. Unparseable values are ignored.
    pub fn apply_env(&mut self) {
        if let Ok(dir) = env::var("TILER_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Ok(file) = env::var("TILER_RATIOS_FILE") {
            self.ratios_file = Some(PathBuf::from(file));
        }
        if let Ok(file) = env::var("TILER_COLORMAPS_FILE") {
            self.colormaps_file = Some(PathBuf::from(file));
        }
        self.max_tile_size = env::var("TILER_MAX_TILE_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(self.max_tile_size);
        self.fetch_timeout_ms = env::var("TILER_FETCH_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(self.fetch_timeout_ms);
        self.encoder.jpeg_quality = env::var("JPEG_QUALITY")
            .ok()
            .and_then(|v| v.parse::<u8>().ok())
            .unwrap_or(self.encoder.jpeg_quality)
            .min(100);
        self.encoder.webp_quality = env::var("WEBP_QUALITY")
            .ok()
            .and_then(|v| v.parse::<f32>().ok())
            .unwrap_or(self.encoder.webp_quality)
            .clamp(0.0, 100.0);
        if let Ok(v) = env::var("WEBP_LOSSLESS") {
            self.encoder.webp_lossless = v == "true" || v == "1";
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn encoder_options(&self) -> EncoderOptions {
        EncoderOptions {
            jpeg_quality: self.encoder.jpeg_quality,
            webp_quality: self.encoder.webp_quality,
            webp_lossless: self.encoder.webp_lossless,
        }
    }
}
