//! Linear histogram stretch to 8-bit display values.
//!
//! Each value is clamped to the input range, mapped linearly onto the output
//! range and truncated to `u8`. Pixels with no data are not special-cased
//! here; the mask compositor forces them to 0 afterwards, so 0 is the floor
//! for invalid pixels on both the band and ratio paths.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use tiler_common::{PixelBuffer, Sample, TilerError, TilerResult};

/// A `(min, max)` pair. `min == max` is rejected; `min > max` inverts the stretch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    /// The full 8-bit display range.
    pub const BYTE: ValueRange = ValueRange {
        min: 0.0,
        max: 255.0,
    };

    pub fn new(min: f64, max: f64) -> TilerResult<Self> {
        if !min.is_finite() || !max.is_finite() {
            return Err(TilerError::Validation(format!(
                "range ({}, {}) must be finite",
                min, max
            )));
        }
        if min == max {
            return Err(TilerError::Validation(format!(
                "range min and max are both {}",
                min
            )));
        }
        Ok(Self { min, max })
    }

    /// Parse `"min,max"` (floats, e.g. `"-1,1"`).
    pub fn parse(param: &str, raw: &str) -> TilerResult<Self> {
        let (min, max) = raw
            .split_once(',')
            .ok_or_else(|| TilerError::invalid_parameter(param, format!("'{}' is not 'min,max'", raw)))?;
        let min: f64 = min
            .trim()
            .parse()
            .map_err(|_| TilerError::invalid_parameter(param, format!("'{}' is not a number", min)))?;
        let max: f64 = max
            .trim()
            .parse()
            .map_err(|_| TilerError::invalid_parameter(param, format!("'{}' is not a number", max)))?;
        Self::new(min, max)
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    fn lower(&self) -> f64 {
        self.min.min(self.max)
    }

    fn upper(&self) -> f64 {
        self.min.max(self.max)
    }

    /// Whether this range fits inside `[0, 255]`.
    pub fn is_byte_range(&self) -> bool {
        self.lower() >= 0.0 && self.upper() <= 255.0
    }
}

/// Map one value from `input` to `output`, clamping first.
///
/// Multiplying before dividing keeps integer inputs exact when
/// `input == output`, so stretching an already stretched tile is a no-op.
#[inline]
pub fn rescale_value(value: f64, input: ValueRange, output: ValueRange) -> f64 {
    if value.is_nan() {
        return output.min;
    }
    let clamped = value.clamp(input.lower(), input.upper());
    (clamped - input.min) * output.span() / input.span() + output.min
}

/// Stretch one plane into 8-bit values. Results are truncated, not rounded.
pub fn linear_rescale<T: Sample>(values: &[T], input: ValueRange, output: ValueRange) -> Vec<u8> {
    values
        .iter()
        .map(|&v| rescale_value(v.to_f64(), input, output) as u8)
        .collect()
}

/// Stretch every band with its own input range.
pub fn rescale_bands<T: Sample>(
    buffer: &PixelBuffer<T>,
    ranges: &[ValueRange],
    output: ValueRange,
) -> TilerResult<PixelBuffer<u8>> {
    if ranges.len() != buffer.bands() {
        return Err(TilerError::Validation(format!(
            "{} rescale ranges for {} bands",
            ranges.len(),
            buffer.bands()
        )));
    }
    if !output.is_byte_range() {
        return Err(TilerError::Validation(format!(
            "output range ({}, {}) does not fit in 8 bits",
            output.min, output.max
        )));
    }

    let mut out = PixelBuffer::<u8>::zeros(buffer.bands(), buffer.width(), buffer.height());
    let plane_len = buffer.plane_len();
    let src = buffer.as_slice();

    // One task per output plane.
    let planes: Vec<&mut [u8]> = out.planes_mut().collect();
    planes
        .into_par_iter()
        .zip(ranges.par_iter())
        .enumerate()
        .for_each(|(band, (plane, &range))| {
            let input = &src[band * plane_len..(band + 1) * plane_len];
            for (dst, &v) in plane.iter_mut().zip(input) {
                *dst = rescale_value(v.to_f64(), range, output) as u8;
            }
        });

    Ok(out)
}
