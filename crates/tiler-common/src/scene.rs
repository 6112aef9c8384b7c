//! CBERS scene identifiers.
//!
//! Scene ids look like `CBERS_4_MUX_20171121_057_094_L2`:
//! satellite, mission, instrument, acquisition date, path, row and
//! processing level separated by underscores.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::{TilerError, TilerResult};

/// Imaging instrument on board the satellite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Instrument {
    /// Multispectral camera, 20 m
    Mux,
    /// Wide field imager, 64 m
    Awfi,
    /// Panchromatic and multispectral camera, 10 m mode
    Pan10m,
    /// Panchromatic and multispectral camera, 5 m mode
    Pan5m,
}

impl Instrument {
    /// Band identifiers the instrument produces.
    pub fn bands(&self) -> &'static [&'static str] {
        match self {
            Instrument::Mux => &["5", "6", "7", "8"],
            Instrument::Awfi => &["13", "14", "15", "16"],
            Instrument::Pan10m => &["2", "3", "4"],
            Instrument::Pan5m => &["1"],
        }
    }

    pub fn has_band(&self, band: &str) -> bool {
        self.bands().contains(&band)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Instrument::Mux => "MUX",
            Instrument::Awfi => "AWFI",
            Instrument::Pan10m => "PAN10M",
            Instrument::Pan5m => "PAN5M",
        }
    }
}

impl FromStr for Instrument {
    type Err = TilerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MUX" => Ok(Instrument::Mux),
            "AWFI" => Ok(Instrument::Awfi),
            "PAN10M" => Ok(Instrument::Pan10m),
            "PAN5M" => Ok(Instrument::Pan5m),
            other => Err(TilerError::invalid_parameter(
                "scene",
                format!("unknown instrument '{}'", other),
            )),
        }
    }
}

/// Parsed CBERS scene identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneId {
    pub scene_id: String,
    pub satellite: String,
    pub mission: String,
    pub instrument: Instrument,
    pub acquisition_date: NaiveDate,
    pub path: u32,
    pub row: u32,
    pub processing_level: String,
}

impl SceneId {
    /// Parse a scene id string.
    pub fn parse(scene: &str) -> TilerResult<Self> {
        let invalid = |message: &str| {
            TilerError::invalid_parameter("scene", format!("'{}': {}", scene, message))
        };

        let parts: Vec<&str> = scene.split('_').collect();
        if parts.len() != 7 {
            return Err(invalid("expected 7 underscore-separated fields"));
        }
        if parts[0] != "CBERS" {
            return Err(invalid("satellite must be CBERS"));
        }
        if parts[1].is_empty() || !parts[1].chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(invalid("invalid mission"));
        }

        let instrument = parts[2].parse::<Instrument>()?;
        let acquisition_date = NaiveDate::parse_from_str(parts[3], "%Y%m%d")
            .map_err(|_| invalid("acquisition date must be YYYYMMDD"))?;
        let path = parse_grid_index(parts[4]).ok_or_else(|| invalid("invalid path"))?;
        let row = parse_grid_index(parts[5]).ok_or_else(|| invalid("invalid row"))?;
        if parts[6].is_empty() || !parts[6].chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(invalid("invalid processing level"));
        }

        Ok(Self {
            scene_id: scene.to_string(),
            satellite: parts[0].to_string(),
            mission: parts[1].to_string(),
            instrument,
            acquisition_date,
            path,
            row,
            processing_level: parts[6].to_string(),
        })
    }

    /// Object-store style key: `CBERS4/MUX/057/094/<scene>`.
    pub fn key(&self) -> String {
        format!(
            "{}{}/{}/{:03}/{:03}/{}",
            self.satellite,
            self.mission,
            self.instrument.name(),
            self.path,
            self.row,
            self.scene_id
        )
    }

    /// Check a band identifier against the instrument's band list.
    pub fn require_band(&self, band: &str) -> TilerResult<()> {
        if self.instrument.has_band(band) {
            Ok(())
        } else {
            Err(TilerError::BandNotFound {
                scene: self.scene_id.clone(),
                band: band.to_string(),
            })
        }
    }
}

/// Path/row fields are zero-padded decimal numbers.
fn parse_grid_index(s: &str) -> Option<u32> {
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Parse a path or row query value (`"57"` and `"057"` are equal).
pub fn parse_path_row(param: &str, value: &str) -> TilerResult<u32> {
    parse_grid_index(value.trim()).ok_or_else(|| {
        TilerError::invalid_parameter(param, format!("'{}' is not a number", value))
    })
}
