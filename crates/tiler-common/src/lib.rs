//! Common types shared across the band tiler crates and services.

pub mod bbox;
pub mod error;
pub mod format;
pub mod raster;
pub mod scene;
pub mod tile;

pub use bbox::BoundingBox;
pub use error::{TilerError, TilerResult};
pub use format::TileFormat;
pub use raster::{PixelBuffer, Sample, ValidityMask};
pub use scene::{Instrument, SceneId};
pub use tile::TileCoord;
