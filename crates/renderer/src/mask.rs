//! Mask compositing: the last numeric step before colormapping and encoding.

use tiler_common::{PixelBuffer, Sample, TilerResult, ValidityMask};

/// Zero every band wherever `mask` is false.
///
/// After this call, masked pixels are exactly zero in all bands whatever the
/// buffer held before.
pub fn apply_mask<T: Sample>(buffer: &mut PixelBuffer<T>, mask: &ValidityMask) -> TilerResult<()> {
    buffer.check_mask(mask)?;
    let flags = mask.as_slice();
    for plane in buffer.planes_mut() {
        for (value, &valid) in plane.iter_mut().zip(flags) {
            if !valid {
                *value = T::default();
            }
        }
    }
    Ok(())
}

/// Owned variant of [`apply_mask`].
pub fn composite<T: Sample>(
    mut buffer: PixelBuffer<T>,
    mask: &ValidityMask,
) -> TilerResult<PixelBuffer<T>> {
    apply_mask(&mut buffer, mask)?;
    Ok(buffer)
}
