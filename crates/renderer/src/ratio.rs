//! Named band-ratio products (vegetation and water indices).
//!
//! The registry is built once at startup, from the built-in table plus an
//! optional YAML file, and is read-only afterwards. Each expression is
//! compiled when it is registered, so a bad formula fails at load time
//! instead of on the first request.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use tiler_common::{TilerError, TilerResult};

use crate::bands::BandSpec;
use crate::colormap::{ColorTableSet, DEFAULT_COLORMAP};
use crate::expression::Expression;
use crate::rescale::ValueRange;

/// A registered ratio product.
#[derive(Debug, Clone)]
pub struct RatioDefinition {
    pub name: String,
    pub expression: Expression,
    /// Expected range of the evaluated values, stretched to `[0, 255]`.
    pub output_range: ValueRange,
    /// Color table applied to the stretched values.
    pub colormap: String,
    pub description: Option<String>,
}

impl RatioDefinition {
    pub fn new(
        name: &str,
        expression: &str,
        output_range: ValueRange,
        colormap: &str,
    ) -> TilerResult<Self> {
        if name.trim().is_empty() {
            return Err(TilerError::Validation("ratio name must not be empty".to_string()));
        }
        Ok(Self {
            name: name.trim().to_ascii_lowercase(),
            expression: Expression::parse(expression)?,
            output_range,
            colormap: colormap.to_string(),
            description: None,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Placeholders in first-seen order (`["b8", "b7"]`).
    pub fn placeholders(&self) -> &[String] {
        self.expression.placeholders()
    }

    /// Bands to fetch, derived from the expression (`["8", "7"]`).
    pub fn band_spec(&self) -> TilerResult<BandSpec> {
        self.expression.band_spec()
    }
}

/// One entry of a ratio configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatioEntry {
    pub name: String,
    pub expression: String,
    /// `[min, max]` of the evaluated values.
    #[serde(default = "default_ratio_range")]
    pub range: [f64; 2],
    #[serde(default = "default_colormap_name")]
    pub colormap: String,
    #[serde(default)]
    pub description: Option<String>,
}

fn default_ratio_range() -> [f64; 2] {
    [-1.0, 1.0]
}

fn default_colormap_name() -> String {
    DEFAULT_COLORMAP.to_string()
}

/// Ratio configuration file layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RatioConfig {
    #[serde(default)]
    pub ratios: Vec<RatioEntry>,
}

impl RatioConfig {
    pub fn from_yaml(yaml: &str) -> TilerResult<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| TilerError::InternalError(format!("Invalid ratio config: {}", e)))
    }
}

/// Read-only lookup table of ratio products.
#[derive(Debug, Clone, Default)]
pub struct RatioRegistry {
    ratios: HashMap<String, RatioDefinition>,
}

impl RatioRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Indices for the CBERS-4 MUX camera: band 5 blue, 6 green, 7 red, 8 NIR.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        let builtins = [
            (
                "ndvi",
                "(b8-b7)/(b8+b7)",
                "Normalized Difference Vegetation Index",
            ),
            (
                "gndvi",
                "(b8-b6)/(b8+b6)",
                "Green Normalized Difference Vegetation Index",
            ),
            (
                "ndwi",
                "(b6-b8)/(b6+b8)",
                "Normalized Difference Water Index",
            ),
        ];
        for (name, expression, description) in builtins {
            let definition =
                RatioDefinition::new(name, expression, ValueRange { min: -1.0, max: 1.0 }, DEFAULT_COLORMAP)
                    .expect("built-in ratio expressions parse")
                    .with_description(description);
            registry.insert(definition);
        }
        registry
    }

    /// Built-ins extended (or overridden by name) with entries from a config.
    pub fn with_config(mut self, config: &RatioConfig) -> TilerResult<Self> {
        for entry in &config.ratios {
            self.register(entry)?;
        }
        Ok(self)
    }

    /// Compile and add one config entry.
    pub fn register(&mut self, entry: &RatioEntry) -> TilerResult<()> {
        let range = ValueRange::new(entry.range[0], entry.range[1]).map_err(|e| {
            TilerError::Validation(format!("ratio '{}': {}", entry.name, e))
        })?;
        let mut definition =
            RatioDefinition::new(&entry.name, &entry.expression, range, &entry.colormap)?;
        definition.description = entry.description.clone();
        debug!(
            ratio = %definition.name,
            expression = %definition.expression,
            bands = ?definition.expression.band_ids(),
            "Registered ratio"
        );
        self.insert(definition);
        Ok(())
    }

    fn insert(&mut self, definition: RatioDefinition) {
        if self.ratios.contains_key(&definition.name) {
            info!(ratio = %definition.name, "Overriding ratio definition");
        }
        self.ratios.insert(definition.name.clone(), definition);
    }

    /// Look up a ratio by name (case-insensitive).
    pub fn lookup(&self, name: &str) -> TilerResult<&RatioDefinition> {
        self.ratios
            .get(&name.trim().to_ascii_lowercase())
            .ok_or_else(|| TilerError::UnknownRatio(name.to_string()))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.ratios.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.ratios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratios.is_empty()
    }

    /// Every ratio must name a color table that exists.
    pub fn check_colormaps(&self, tables: &ColorTableSet) -> TilerResult<()> {
        for definition in self.ratios.values() {
            tables.get(&definition.colormap).map_err(|_| {
                TilerError::UnknownColormap(format!(
                    "{} (referenced by ratio '{}')",
                    definition.colormap, definition.name
                ))
            })?;
        }
        Ok(())
    }
}
