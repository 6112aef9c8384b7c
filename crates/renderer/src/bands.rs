//! Band selection and histogram cut parsing for direct band tiles.
//!
//! Band lists arrive as free-form strings (`"7,6,5"`); every maximal run of
//! digits is one band identifier. Histogram cuts arrive as `"0,255;10,200"`;
//! every `digits,digits` token is one `(min, max)` pair. The two lists must
//! be the same length, which is checked here, before any raster is fetched.

use once_cell::sync::Lazy;
use regex::Regex;

use tiler_common::{TilerError, TilerResult};

use crate::rescale::ValueRange;

/// Band combination used when a tile request does not name one.
pub const DEFAULT_BANDS: &str = "7,6,5";

/// Tile edge length used when a request does not name one.
pub const DEFAULT_TILE_SIZE: usize = 256;

static BAND_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid band regex"));
static HISTO_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+,\d+").expect("valid histogram regex"));

/// Ordered, non-empty list of band identifiers. Output channel order follows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandSpec(Vec<String>);

impl BandSpec {
    /// Build from identifiers that are already split.
    pub fn new(bands: Vec<String>) -> TilerResult<Self> {
        if bands.is_empty() {
            return Err(TilerError::Validation("at least one band is required".to_string()));
        }
        Ok(Self(bands))
    }

    /// Extract band identifiers as maximal digit runs.
    pub fn parse(raw: &str) -> TilerResult<Self> {
        let bands = BAND_TOKEN
            .find_iter(raw)
            .map(|m| m.as_str().to_string())
            .collect();
        Self::new(bands)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl std::fmt::Display for BandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join(","))
    }
}

/// One input range per band, in band order.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramCut(Vec<ValueRange>);

impl HistogramCut {
    /// `(0, 255)` once per band.
    pub fn default_for(band_count: usize) -> Self {
        Self(vec![ValueRange::BYTE; band_count])
    }

    /// Extract `digits,digits` pairs. Each pair must be a usable range.
    pub fn parse(raw: &str) -> TilerResult<Self> {
        let mut cuts = Vec::new();
        for token in HISTO_TOKEN.find_iter(raw) {
            let (min, max) = token
                .as_str()
                .split_once(',')
                .ok_or_else(|| TilerError::invalid_parameter("histo", token.as_str()))?;
            let min: f64 = min
                .parse()
                .map_err(|_| TilerError::invalid_parameter("histo", min.to_string()))?;
            let max: f64 = max
                .parse()
                .map_err(|_| TilerError::invalid_parameter("histo", max.to_string()))?;
            cuts.push(ValueRange::new(min, max)?);
        }
        Ok(Self(cuts))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn ranges(&self) -> &[ValueRange] {
        &self.0
    }
}

/// A validated band list with its matching histogram cuts.
#[derive(Debug, Clone, PartialEq)]
pub struct BandSelection {
    pub bands: BandSpec,
    pub cuts: HistogramCut,
}

impl BandSelection {
    /// Pair bands with cuts. Lengths must match.
    pub fn new(bands: BandSpec, cuts: HistogramCut) -> TilerResult<Self> {
        if bands.len() != cuts.len() {
            return Err(TilerError::Validation(format!(
                "band/histogram count mismatch: {} bands, {} histogram cuts",
                bands.len(),
                cuts.len()
            )));
        }
        Ok(Self { bands, cuts })
    }

    /// Parse the raw `rgb` and `histo` request values.
    ///
    /// A missing band list falls back to [`DEFAULT_BANDS`]; a missing
    /// histogram synthesizes `(0, 255)` per band.
    pub fn from_query(rgb: Option<&str>, histo: Option<&str>) -> TilerResult<Self> {
        let bands = BandSpec::parse(rgb.unwrap_or(DEFAULT_BANDS))?;
        let cuts = match histo {
            Some(raw) => HistogramCut::parse(raw)?,
            None => HistogramCut::default_for(bands.len()),
        };
        Self::new(bands, cuts)
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }
}

/// Parse the optional `tile` size parameter.
///
/// Defaults to [`DEFAULT_TILE_SIZE`]; a supplied value must be a positive
/// integer no larger than `max_size`.
pub fn parse_tile_size(raw: Option<&str>, max_size: usize) -> TilerResult<usize> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_TILE_SIZE);
    };
    let size: usize = raw.trim().parse().map_err(|_| {
        TilerError::Validation(format!("tile size '{}' is not a positive integer", raw))
    })?;
    if size == 0 {
        return Err(TilerError::Validation("tile size must be positive".to_string()));
    }
    if size > max_size {
        return Err(TilerError::Validation(format!(
            "tile size {} exceeds maximum {}",
            size, max_size
        )));
    }
    Ok(size)
}
