//! Output image formats for rendered tiles.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::{TilerError, TilerResult};

/// Image container a tile is encoded into.
///
/// `jpg` is accepted as an alias and normalized to [`TileFormat::Jpeg`], so
/// both tokens reach the encoder as the same value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TileFormat {
    Png,
    Jpeg,
    Webp,
}

impl TileFormat {
    /// Parse a file extension or format token (case-insensitive).
    pub fn from_extension(ext: &str) -> TilerResult<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Ok(TileFormat::Png),
            "jpg" | "jpeg" => Ok(TileFormat::Jpeg),
            "webp" => Ok(TileFormat::Webp),
            other => Err(TilerError::UnsupportedFormat(other.to_string())),
        }
    }

    /// Canonical format name, as used in the content type.
    pub fn name(&self) -> &'static str {
        match self {
            TileFormat::Png => "png",
            TileFormat::Jpeg => "jpeg",
            TileFormat::Webp => "webp",
        }
    }

    /// MIME type for HTTP responses.
    pub fn mime_type(&self) -> &'static str {
        match self {
            TileFormat::Png => "image/png",
            TileFormat::Jpeg => "image/jpeg",
            TileFormat::Webp => "image/webp",
        }
    }
}

impl FromStr for TileFormat {
    type Err = TilerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s)
    }
}

impl std::fmt::Display for TileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Split the last path segment of a tile URL (`"94.png"`) into the row and
/// the requested format.
pub fn parse_row_and_format(segment: &str) -> TilerResult<(u32, TileFormat)> {
    let (row, ext) = segment
        .rsplit_once('.')
        .ok_or_else(|| TilerError::UnsupportedFormat(format!("missing extension in '{}'", segment)))?;
    let format = TileFormat::from_extension(ext)?;
    let row = row
        .parse::<u32>()
        .map_err(|_| TilerError::invalid_parameter("y", format!("'{}' is not a tile row", row)))?;
    Ok((row, format))
}
