//! Pixel post-processing for satellite band tiles.
//!
//! Stages, in the order a tile passes through them:
//! - Band selection and histogram cuts ([`bands`])
//! - Band arithmetic for ratio products ([`expression`], [`arithmetic`], [`ratio`])
//! - Linear stretch to 8 bits ([`rescale`])
//! - Mask compositing ([`mask`])
//! - Color lookup for single-band products ([`colormap`])
//! - Image encoding ([`encode`], [`png`])

pub mod arithmetic;
pub mod bands;
pub mod colormap;
pub mod encode;
pub mod expression;
pub mod mask;
pub mod pipeline;
pub mod png;
pub mod ratio;
pub mod rescale;

pub use bands::{BandSelection, BandSpec, HistogramCut};
pub use colormap::{ColorTable, ColorTableSet, DEFAULT_COLORMAP};
pub use encode::{encode, EncoderOptions};
pub use expression::Expression;
pub use pipeline::{render_bands, render_ratio, RenderedTile};
pub use ratio::{RatioConfig, RatioDefinition, RatioRegistry};
pub use rescale::ValueRange;
