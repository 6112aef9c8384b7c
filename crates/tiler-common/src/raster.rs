//! Band-sequential pixel buffers and validity masks.
//!
//! A [`PixelBuffer`] holds `bands` planes of `width * height` samples each,
//! stored plane after plane (shape `(bands, height, width)`). A
//! [`ValidityMask`] has the spatial shape of one plane and travels with the
//! buffer through every pipeline stage.

use num_traits::AsPrimitive;

use crate::{TilerError, TilerResult};

/// Numeric sample types a pixel buffer can hold.
pub trait Sample: Copy + Default + PartialEq + Send + Sync + AsPrimitive<f64> + 'static {
    /// The sample as a float, the type all band math runs in.
    #[inline(always)]
    fn to_f64(self) -> f64 {
        self.as_()
    }

    /// Zero is the no-data value of the source imagery.
    #[inline(always)]
    fn is_nodata(self) -> bool {
        self.to_f64() == 0.0
    }
}

impl<T> Sample for T where T: Copy + Default + PartialEq + Send + Sync + AsPrimitive<f64> + 'static {}

/// Multi-band raster window, one plane per band.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer<T> {
    data: Vec<T>,
    bands: usize,
    width: usize,
    height: usize,
}

impl<T: Sample> PixelBuffer<T> {
    /// A buffer filled with the type's default (zero) value.
    pub fn zeros(bands: usize, width: usize, height: usize) -> Self {
        Self {
            data: vec![T::default(); bands * width * height],
            bands,
            width,
            height,
        }
    }

    /// Wrap band-sequential data, checking its length against the shape.
    pub fn from_vec(data: Vec<T>, bands: usize, width: usize, height: usize) -> TilerResult<Self> {
        if bands == 0 || width == 0 || height == 0 {
            return Err(TilerError::InternalError(format!(
                "Empty pixel buffer shape ({}, {}, {})",
                bands, height, width
            )));
        }
        if data.len() != bands * width * height {
            return Err(TilerError::InternalError(format!(
                "Pixel buffer holds {} samples, shape ({}, {}, {}) needs {}",
                data.len(),
                bands,
                height,
                width,
                bands * width * height
            )));
        }
        Ok(Self {
            data,
            bands,
            width,
            height,
        })
    }

    /// Stack individual planes into one buffer. Planes keep their order.
    pub fn from_planes(planes: Vec<Vec<T>>, width: usize, height: usize) -> TilerResult<Self> {
        let bands = planes.len();
        let mut data = Vec::with_capacity(bands * width * height);
        for (idx, plane) in planes.into_iter().enumerate() {
            if plane.len() != width * height {
                return Err(TilerError::InternalError(format!(
                    "Plane {} holds {} samples, expected {}",
                    idx,
                    plane.len(),
                    width * height
                )));
            }
            data.extend(plane);
        }
        Self::from_vec(data, bands, width, height)
    }

    pub fn bands(&self) -> usize {
        self.bands
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// `(bands, height, width)`
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.bands, self.height, self.width)
    }

    /// Samples per plane.
    pub fn plane_len(&self) -> usize {
        self.width * self.height
    }

    /// Borrow one band plane.
    ///
    /// # Panics
    /// Panics if `index >= bands()`.
    pub fn band(&self, index: usize) -> &[T] {
        let len = self.plane_len();
        &self.data[index * len..(index + 1) * len]
    }

    /// Iterate over band planes in order.
    pub fn planes(&self) -> std::slice::ChunksExact<'_, T> {
        self.data.chunks_exact(self.plane_len())
    }

    /// Iterate mutably over band planes in order.
    pub fn planes_mut(&mut self) -> std::slice::ChunksExactMut<'_, T> {
        let len = self.plane_len();
        self.data.chunks_exact_mut(len)
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Check that a mask covers exactly one plane of this buffer.
    pub fn check_mask(&self, mask: &ValidityMask) -> TilerResult<()> {
        if mask.width() != self.width || mask.height() != self.height {
            return Err(TilerError::InternalError(format!(
                "Mask shape ({}, {}) does not match buffer shape ({}, {})",
                mask.height(),
                mask.width(),
                self.height,
                self.width
            )));
        }
        Ok(())
    }
}

/// Per-pixel "has source data" flags for one plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidityMask {
    data: Vec<bool>,
    width: usize,
    height: usize,
}

impl ValidityMask {
    /// Every pixel valid.
    pub fn all_valid(width: usize, height: usize) -> Self {
        Self {
            data: vec![true; width * height],
            width,
            height,
        }
    }

    pub fn from_vec(data: Vec<bool>, width: usize, height: usize) -> TilerResult<Self> {
        if data.len() != width * height {
            return Err(TilerError::InternalError(format!(
                "Mask holds {} flags, expected {}",
                data.len(),
                width * height
            )));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Valid where every band of `buffer` is non-zero.
    pub fn from_nonzero_bands<T: Sample>(buffer: &PixelBuffer<T>) -> Self {
        let mut data = vec![true; buffer.plane_len()];
        for plane in buffer.planes() {
            for (valid, &value) in data.iter_mut().zip(plane) {
                *valid &= !value.is_nodata();
            }
        }
        Self {
            data,
            width: buffer.width(),
            height: buffer.height(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Flag at a flat (row-major) index.
    #[inline]
    pub fn is_valid(&self, index: usize) -> bool {
        self.data[index]
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.data
    }

    pub fn count_valid(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }

    /// Pixel-wise AND with another mask of the same shape.
    pub fn intersect(&mut self, other: &ValidityMask) -> TilerResult<()> {
        if other.width != self.width || other.height != self.height {
            return Err(TilerError::InternalError(
                "Cannot intersect masks of different shapes".to_string(),
            ));
        }
        for (a, &b) in self.data.iter_mut().zip(&other.data) {
            *a &= b;
        }
        Ok(())
    }
}
