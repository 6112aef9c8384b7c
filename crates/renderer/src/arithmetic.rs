//! Band arithmetic evaluation over whole planes.
//!
//! Input planes are bound to expression placeholders through an explicit
//! name → plane map. A pixel is valid only when every referenced band is
//! non-zero there (the product of the referenced planes is non-zero) and the
//! formula produced a finite number. Non-finite results are replaced with
//! [`NODATA`] and masked out; they never surface as errors.

use rayon::prelude::*;
use std::collections::HashMap;

use tiler_common::{PixelBuffer, Sample, TilerError, TilerResult, ValidityMask};

use crate::expression::Expression;
use crate::ratio::RatioDefinition;

/// Value written where evaluation produced NaN or an infinity.
pub const NODATA: f64 = 0.0;

/// Named float planes, all of one spatial shape.
#[derive(Debug, Clone)]
pub struct BandPlanes {
    planes: HashMap<String, Vec<f64>>,
    width: usize,
    height: usize,
}

impl BandPlanes {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            planes: HashMap::new(),
            width,
            height,
        }
    }

    /// Name each band of `buffer` after the matching entry of `names`.
    pub fn from_buffer<T: Sample>(buffer: &PixelBuffer<T>, names: &[String]) -> TilerResult<Self> {
        if names.len() != buffer.bands() {
            return Err(TilerError::InternalError(format!(
                "{} placeholders for a {}-band buffer",
                names.len(),
                buffer.bands()
            )));
        }
        let mut planes = Self::new(buffer.width(), buffer.height());
        for (name, plane) in names.iter().zip(buffer.planes()) {
            planes.insert(name, plane.iter().map(|v| v.to_f64()).collect())?;
        }
        Ok(planes)
    }

    /// Bind a plane to a placeholder name.
    pub fn insert(&mut self, name: &str, plane: Vec<f64>) -> TilerResult<()> {
        if plane.len() != self.width * self.height {
            return Err(TilerError::InternalError(format!(
                "plane '{}' holds {} samples, expected {}",
                name,
                plane.len(),
                self.width * self.height
            )));
        }
        self.planes.insert(name.to_ascii_lowercase(), plane);
        Ok(())
    }

    fn as_map(&self) -> HashMap<String, &[f64]> {
        self.planes
            .iter()
            .map(|(name, plane)| (name.clone(), plane.as_slice()))
            .collect()
    }
}

/// Single-band result of an expression and where it is valid.
#[derive(Debug, Clone)]
pub struct DerivedBand {
    pub values: PixelBuffer<f64>,
    pub mask: ValidityMask,
}

/// Evaluate `expression` pixel by pixel over `planes`.
pub fn evaluate(expression: &Expression, planes: &BandPlanes) -> TilerResult<DerivedBand> {
    let map = planes.as_map();
    let bound = expression.bind(&map)?;
    let width = planes.width;
    let height = planes.height;

    let mut values = vec![NODATA; width * height];
    let mut valid = vec![false; width * height];

    values
        .par_chunks_mut(width)
        .zip(valid.par_chunks_mut(width))
        .enumerate()
        .for_each(|(row, (out_row, valid_row))| {
            let mut pixel = vec![0.0f64; bound.len()];
            let offset = row * width;
            for col in 0..width {
                let idx = offset + col;
                let mut has_data = true;
                for (slot, plane) in pixel.iter_mut().zip(&bound) {
                    *slot = plane[idx];
                    has_data &= *slot != 0.0;
                }
                let result = expression.eval(&pixel);
                if result.is_finite() {
                    out_row[col] = result;
                    valid_row[col] = has_data;
                } else {
                    out_row[col] = NODATA;
                    valid_row[col] = false;
                }
            }
        });

    Ok(DerivedBand {
        values: PixelBuffer::from_vec(values, 1, width, height)?,
        mask: ValidityMask::from_vec(valid, width, height)?,
    })
}

/// Evaluate a ratio over a fetched buffer whose bands follow the ratio's
/// placeholder order.
pub fn evaluate_ratio<T: Sample>(
    buffer: &PixelBuffer<T>,
    ratio: &RatioDefinition,
) -> TilerResult<DerivedBand> {
    let planes = BandPlanes::from_buffer(buffer, ratio.placeholders())?;
    evaluate(&ratio.expression, &planes)
}
