//! Color lookup tables for single-band products.
//!
//! Tables are defined as gradient stops over `[0, 255]` and expanded into
//! 256 RGBA entries when loaded. Extra tables can be supplied as JSON:
//!
//! ```json
//! {
//!   "colormaps": {
//!     "water": {
//!       "description": "Water index",
//!       "stops": [
//!         {"value": 0, "color": "#8c510a"},
//!         {"value": 255, "color": "#01665e"}
//!       ]
//!     }
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use tiler_common::{PixelBuffer, TilerError, TilerResult};

/// Table used by ratio products that do not name one.
pub const DEFAULT_COLORMAP: &str = "cfastie";

/// Gradient stop: a position in `[0, 255]` and a `#rrggbb` or `#rrggbbaa` color.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ColorStop {
    pub value: f32,
    pub color: String,
}

/// A table definition as found in a colormap file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ColormapDefinition {
    pub description: Option<String>,
    pub stops: Vec<ColorStop>,
}

/// Colormap file layout.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ColormapConfig {
    #[serde(default)]
    pub colormaps: HashMap<String, ColormapDefinition>,
}

impl ColormapConfig {
    /// Load colormap configuration from JSON string
    pub fn from_json(json_str: &str) -> TilerResult<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| TilerError::InternalError(format!("Invalid colormap config: {}", e)))
    }
}

/// Parse `#rrggbb` / `#rrggbbaa` (hash optional) into RGBA.
pub fn hex_to_rgba(hex: &str) -> Option<[u8; 4]> {
    let hex = hex.trim().trim_start_matches('#');
    if hex.len() != 6 && hex.len() != 8 {
        return None;
    }

    let r = u8::from_str_radix(hex.get(0..2)?, 16).ok()?;
    let g = u8::from_str_radix(hex.get(2..4)?, 16).ok()?;
    let b = u8::from_str_radix(hex.get(4..6)?, 16).ok()?;
    let a = match hex.get(6..8) {
        Some(alpha) => u8::from_str_radix(alpha, 16).ok()?,
        None => 255,
    };

    Some([r, g, b, a])
}

/// Linear color interpolation
fn interpolate_color(c1: [u8; 4], c2: [u8; 4], t: f32) -> [u8; 4] {
    let t = t.clamp(0.0, 1.0);
    let t_inv = 1.0 - t;
    let mix = |a: u8, b: u8| ((a as f32 * t_inv) + (b as f32 * t)).round() as u8;
    [
        mix(c1[0], c2[0]),
        mix(c1[1], c2[1]),
        mix(c1[2], c2[2]),
        mix(c1[3], c2[3]),
    ]
}

/// 256-entry RGBA lookup table.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorTable {
    name: String,
    entries: Vec<[u8; 4]>,
}

impl ColorTable {
    /// Expand gradient stops into a full table. Positions outside the stop
    /// span take the nearest end color.
    pub fn from_stops(name: &str, stops: &[ColorStop]) -> TilerResult<Self> {
        if stops.is_empty() {
            return Err(TilerError::Validation(format!(
                "colormap '{}' has no stops",
                name
            )));
        }

        let mut parsed: Vec<(f32, [u8; 4])> = Vec::with_capacity(stops.len());
        for stop in stops {
            let color = hex_to_rgba(&stop.color).ok_or_else(|| {
                TilerError::Validation(format!(
                    "colormap '{}': invalid color '{}'",
                    name, stop.color
                ))
            })?;
            if !stop.value.is_finite() {
                return Err(TilerError::Validation(format!(
                    "colormap '{}': stop value must be finite",
                    name
                )));
            }
            parsed.push((stop.value.clamp(0.0, 255.0), color));
        }
        parsed.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        let entries = (0..256)
            .map(|i| {
                let v = i as f32;
                let upper = parsed.iter().position(|(pos, _)| *pos >= v);
                match upper {
                    None => parsed[parsed.len() - 1].1,
                    Some(0) => parsed[0].1,
                    Some(idx) => {
                        let (p0, c0) = parsed[idx - 1];
                        let (p1, c1) = parsed[idx];
                        let span = p1 - p0;
                        if span <= f32::EPSILON {
                            c1
                        } else {
                            interpolate_color(c0, c1, (v - p0) / span)
                        }
                    }
                }
            })
            .collect();

        Ok(Self {
            name: name.to_string(),
            entries,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline(always)]
    pub fn color(&self, value: u8) -> [u8; 4] {
        self.entries[value as usize]
    }

    pub fn entries(&self) -> &[[u8; 4]] {
        &self.entries
    }

    /// Whether any entry is not fully opaque.
    pub fn has_alpha(&self) -> bool {
        self.entries.iter().any(|c| c[3] != 255)
    }

    /// Output channel count: RGB, or RGBA when the table carries alpha.
    pub fn channels(&self) -> usize {
        if self.has_alpha() {
            4
        } else {
            3
        }
    }
}

/// Map a single-band 8-bit buffer through `table`.
///
/// Produces three bands (RGB), or four when the table has transparency.
pub fn apply_colormap(buffer: &PixelBuffer<u8>, table: &ColorTable) -> TilerResult<PixelBuffer<u8>> {
    if buffer.bands() != 1 {
        return Err(TilerError::Validation(format!(
            "colormap needs a single band, got {}",
            buffer.bands()
        )));
    }

    let channels = table.channels();
    let mut out = PixelBuffer::<u8>::zeros(channels, buffer.width(), buffer.height());
    let src = buffer.band(0);
    for (channel, plane) in out.planes_mut().enumerate() {
        for (dst, &v) in plane.iter_mut().zip(src) {
            *dst = table.color(v)[channel];
        }
    }
    Ok(out)
}

/// Named color tables, built once at startup and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct ColorTableSet {
    tables: HashMap<String, ColorTable>,
}

fn stops(pairs: &[(f32, &str)]) -> Vec<ColorStop> {
    pairs
        .iter()
        .map(|&(value, color)| ColorStop {
            value,
            color: color.to_string(),
        })
        .collect()
}

impl ColorTableSet {
    /// The built-in tables: `cfastie`, `viridis`, `rdylgn`, `greys`.
    ///
    /// All four are gradient-stop approximations. `cfastie` in particular
    /// interpolates ten anchors of the 256-entry cfastie lookup table, so
    /// entries between anchors differ slightly from the published table.
    /// Load the exact table through a colormap file when byte-identical
    /// colours matter.
    pub fn builtin() -> Self {
        let definitions: [(&str, Vec<ColorStop>); 4] = [
            // Grayscale below NDVI 0, then blue through green, yellow, red
            // and magenta for dense vegetation.
            (
                "cfastie",
                stops(&[
                    (0.0, "#ffffff"),
                    (84.0, "#1e1e1e"),
                    (85.0, "#0000b4"),
                    (110.0, "#0064ff"),
                    (128.0, "#00c864"),
                    (150.0, "#00ff00"),
                    (175.0, "#ffff00"),
                    (200.0, "#ff8c00"),
                    (225.0, "#ff0000"),
                    (255.0, "#ff00ff"),
                ]),
            ),
            (
                "viridis",
                stops(&[
                    (0.0, "#440154"),
                    (64.0, "#3b528b"),
                    (128.0, "#21918c"),
                    (192.0, "#5ec962"),
                    (255.0, "#fde725"),
                ]),
            ),
            (
                "rdylgn",
                stops(&[
                    (0.0, "#a50026"),
                    (64.0, "#f46d43"),
                    (128.0, "#ffffbf"),
                    (192.0, "#66bd63"),
                    (255.0, "#006837"),
                ]),
            ),
            ("greys", stops(&[(0.0, "#000000"), (255.0, "#ffffff")])),
        ];

        let mut set = Self::default();
        for (name, stops) in definitions {
            let table = ColorTable::from_stops(name, &stops).expect("built-in colormaps are valid");
            set.tables.insert(name.to_string(), table);
        }
        set
    }

    /// Add (or replace) the tables of a colormap file.
    pub fn with_config(mut self, config: &ColormapConfig) -> TilerResult<Self> {
        for (name, definition) in &config.colormaps {
            let table = ColorTable::from_stops(name, &definition.stops)?;
            self.tables.insert(name.to_ascii_lowercase(), table);
        }
        Ok(self)
    }

    pub fn insert(&mut self, table: ColorTable) {
        self.tables.insert(table.name.to_ascii_lowercase(), table);
    }

    /// Look up a table by name (case-insensitive).
    pub fn get(&self, name: &str) -> TilerResult<&ColorTable> {
        self.tables
            .get(&name.trim().to_ascii_lowercase())
            .ok_or_else(|| TilerError::UnknownColormap(name.to_string()))
    }

    /// Table names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tables.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
