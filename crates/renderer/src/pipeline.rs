//! CPU stages of the two tile products, composed from the stage modules.
//!
//! These functions take an already fetched buffer and mask. Fetching,
//! request validation and timing live with the caller.

use tracing::instrument;

use tiler_common::{PixelBuffer, Sample, TilerError, TilerResult, ValidityMask};

use crate::arithmetic::evaluate_ratio;
use crate::bands::BandSelection;
use crate::colormap::{apply_colormap, ColorTable};
use crate::mask::composite;
use crate::ratio::RatioDefinition;
use crate::rescale::{rescale_bands, ValueRange};

/// Display-ready pixels and the mask the encoder turns into alpha.
#[derive(Debug, Clone)]
pub struct RenderedTile {
    pub pixels: PixelBuffer<u8>,
    pub mask: ValidityMask,
}

/// Direct-band product: stretch each band with its cut, then zero masked pixels.
#[instrument(skip_all, fields(bands = %selection.bands))]
pub fn render_bands<T: Sample>(
    buffer: &PixelBuffer<T>,
    mask: &ValidityMask,
    selection: &BandSelection,
) -> TilerResult<RenderedTile> {
    if buffer.bands() != selection.band_count() {
        return Err(TilerError::InternalError(format!(
            "raster source returned {} bands, {} requested",
            buffer.bands(),
            selection.band_count()
        )));
    }
    let stretched = rescale_bands(buffer, selection.cuts.ranges(), ValueRange::BYTE)?;
    let pixels = composite(stretched, mask)?;
    Ok(RenderedTile {
        pixels,
        mask: mask.clone(),
    })
}

/// Ratio product up to the 8-bit single band: evaluate, stretch `range`
/// onto `[0, 255]` and zero pixels invalid in either the fetch or the
/// evaluation.
#[instrument(skip_all, fields(ratio = %ratio.name))]
pub fn render_ratio_index<T: Sample>(
    buffer: &PixelBuffer<T>,
    mask: &ValidityMask,
    ratio: &RatioDefinition,
    range: ValueRange,
) -> TilerResult<RenderedTile> {
    let derived = evaluate_ratio(buffer, ratio)?;
    let mut valid = derived.mask;
    valid.intersect(mask)?;

    let stretched = rescale_bands(&derived.values, &[range], ValueRange::BYTE)?;
    let pixels = composite(stretched, &valid)?;
    Ok(RenderedTile {
        pixels,
        mask: valid,
    })
}

/// Full ratio product: [`render_ratio_index`] then the color table.
///
/// Masked pixels are zeroed again after colormapping, since a table entry
/// for 0 is rarely black.
pub fn render_ratio<T: Sample>(
    buffer: &PixelBuffer<T>,
    mask: &ValidityMask,
    ratio: &RatioDefinition,
    range: ValueRange,
    table: &ColorTable,
) -> TilerResult<RenderedTile> {
    let index = render_ratio_index(buffer, mask, ratio, range)?;
    let colored = apply_colormap(&index.pixels, table)?;
    let pixels = composite(colored, &index.mask)?;
    Ok(RenderedTile {
        pixels,
        mask: index.mask,
    })
}
