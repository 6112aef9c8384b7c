//! Application state and shared resources.

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tracing::info;

use renderer::colormap::ColormapConfig;
use renderer::{ColorTableSet, RatioConfig, RatioRegistry};
use scene_store::{CatalogSearch, LocalSceneStore, RasterSource, SceneMetadataService};

use crate::config::TilerConfig;
use crate::metrics::MetricsCollector;
use crate::pipeline::TilePipeline;

/// Shared application state.
pub struct AppState {
    pub config: TilerConfig,
    pub ratios: Arc<RatioRegistry>,
    pub colormaps: Arc<ColorTableSet>,
    pub pipeline: TilePipeline,
    pub scenes: Arc<dyn SceneMetadataService>,
    pub catalog: Arc<dyn CatalogSearch>,
    pub metrics: Arc<MetricsCollector>,
    pub prometheus: Option<PrometheusHandle>,
}

/// The data backends behind the service.
pub struct Backends {
    pub source: Arc<dyn RasterSource>,
    pub scenes: Arc<dyn SceneMetadataService>,
    pub catalog: Arc<dyn CatalogSearch>,
}

impl Backends {
    /// All three roles served by one local directory store.
    pub fn local(store: LocalSceneStore) -> Self {
        let store = Arc::new(store);
        Self {
            source: store.clone(),
            scenes: store.clone(),
            catalog: store,
        }
    }
}

impl AppState {
    /// Build state from config: load ratio and color table files and open
    /// the local scene store.
    pub fn new(config: TilerConfig) -> Result<Self> {
        let colormaps = load_colormaps(&config)?;
        let ratios = load_ratios(&config)?;
        ratios
            .check_colormaps(&colormaps)
            .context("Ratio configuration references an unknown colormap")?;

        info!(
            data_dir = %config.data_dir.display(),
            ratios = ?ratios.names(),
            colormaps = ?colormaps.names(),
            "Initialized tiler state"
        );

        let backends = Backends::local(LocalSceneStore::new(config.data_dir.clone()));
        Ok(Self::with_backends(config, ratios, colormaps, backends))
    }

    pub fn with_backends(
        config: TilerConfig,
        ratios: RatioRegistry,
        colormaps: ColorTableSet,
        backends: Backends,
    ) -> Self {
        let ratios = Arc::new(ratios);
        let colormaps = Arc::new(colormaps);
        let metrics = Arc::new(MetricsCollector::new());
        let pipeline = TilePipeline::new(
            backends.source,
            ratios.clone(),
            colormaps.clone(),
            config.encoder_options(),
            config.fetch_timeout(),
            config.max_tile_size,
            metrics.clone(),
        );

        Self {
            config,
            ratios,
            colormaps,
            pipeline,
            scenes: backends.scenes,
            catalog: backends.catalog,
            metrics,
            prometheus: None,
        }
    }

    pub fn with_prometheus(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }
}

fn load_ratios(config: &TilerConfig) -> Result<RatioRegistry> {
    let registry = RatioRegistry::builtin();
    let Some(path) = &config.ratios_file else {
        return Ok(registry);
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read ratios file {}", path.display()))?;
    let ratio_config = RatioConfig::from_yaml(&raw)
        .with_context(|| format!("Failed to parse ratios file {}", path.display()))?;
    registry
        .with_config(&ratio_config)
        .with_context(|| format!("Invalid ratio in {}", path.display()))
}

fn load_colormaps(config: &TilerConfig) -> Result<ColorTableSet> {
    let tables = ColorTableSet::builtin();
    let Some(path) = &config.colormaps_file else {
        return Ok(tables);
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read colormaps file {}", path.display()))?;
    let colormap_config = ColormapConfig::from_json(&raw)
        .with_context(|| format!("Failed to parse colormaps file {}", path.display()))?;
    tables
        .with_config(&colormap_config)
        .with_context(|| format!("Invalid colormap in {}", path.display()))
}
