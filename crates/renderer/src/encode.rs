//! Tile encoding: planar 8-bit buffers plus validity mask to image bytes.
//!
//! The mask travels as alpha for formats that have one (PNG, WebP). JPEG
//! has no alpha; masked pixels are already zero by the time they get here.

use image::codecs::jpeg::JpegEncoder;
use image::ColorType;
use std::io::Cursor;
use tracing::debug;

use tiler_common::{PixelBuffer, TileFormat, TilerError, TilerResult, ValidityMask};

use crate::colormap::{apply_colormap, ColorTable};
use crate::png::{self, PngColorType};

/// Default JPEG quality (0-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Default WebP quality (0-100).
pub const DEFAULT_WEBP_QUALITY: f32 = 85.0;

/// Encoder settings, fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncoderOptions {
    pub jpeg_quality: u8,
    pub webp_quality: f32,
    pub webp_lossless: bool,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            webp_quality: DEFAULT_WEBP_QUALITY,
            webp_lossless: false,
        }
    }
}

/// Encode `buffer` (1, 3 or 4 bands) in `format`.
///
/// A single-band buffer is colormapped first when `color_table` is given.
/// A fourth band is treated as alpha and combined with `mask`.
pub fn encode(
    buffer: &PixelBuffer<u8>,
    mask: &ValidityMask,
    format: TileFormat,
    color_table: Option<&ColorTable>,
    options: &EncoderOptions,
) -> TilerResult<Vec<u8>> {
    buffer.check_mask(mask)?;

    let colored;
    let buffer = match color_table {
        Some(table) if buffer.bands() == 1 => {
            colored = apply_colormap(buffer, table)?;
            &colored
        }
        _ => buffer,
    };

    if !matches!(buffer.bands(), 1 | 3 | 4) {
        return Err(TilerError::EncodeError(format!(
            "cannot encode a {}-band buffer",
            buffer.bands()
        )));
    }

    let bytes = match format {
        TileFormat::Png => encode_png(buffer, mask)?,
        TileFormat::Jpeg => encode_jpeg(buffer, options.jpeg_quality)?,
        TileFormat::Webp => encode_webp(buffer, mask, options)?,
    };

    debug!(
        format = format.name(),
        bands = buffer.bands(),
        width = buffer.width(),
        height = buffer.height(),
        bytes = bytes.len(),
        "Encoded tile"
    );
    Ok(bytes)
}

/// Interleave to RGBA, gray replicated, alpha from band 4 and the mask.
fn to_rgba(buffer: &PixelBuffer<u8>, mask: &ValidityMask) -> Vec<u8> {
    let n = buffer.plane_len();
    let flags = mask.as_slice();
    let mut out = Vec::with_capacity(n * 4);
    for i in 0..n {
        let (r, g, b) = match buffer.bands() {
            1 => {
                let v = buffer.band(0)[i];
                (v, v, v)
            }
            _ => (buffer.band(0)[i], buffer.band(1)[i], buffer.band(2)[i]),
        };
        let alpha = if !flags[i] {
            0
        } else if buffer.bands() == 4 {
            buffer.band(3)[i]
        } else {
            255
        };
        out.extend_from_slice(&[r, g, b, alpha]);
    }
    out
}

/// Interleave the first `channels` bands.
fn interleave(buffer: &PixelBuffer<u8>, channels: usize) -> Vec<u8> {
    let n = buffer.plane_len();
    let mut out = Vec::with_capacity(n * channels);
    for i in 0..n {
        for band in 0..channels {
            out.push(buffer.band(band)[i]);
        }
    }
    out
}

fn encode_png(buffer: &PixelBuffer<u8>, mask: &ValidityMask) -> TilerResult<Vec<u8>> {
    let (width, height) = (buffer.width(), buffer.height());
    if buffer.bands() == 1 && mask.count_valid() == mask.len() {
        return png::encode(buffer.band(0), width, height, PngColorType::Gray);
    }
    png::encode_rgba_auto(&to_rgba(buffer, mask), width, height)
}

fn encode_jpeg(buffer: &PixelBuffer<u8>, quality: u8) -> TilerResult<Vec<u8>> {
    let (pixels, color_type) = if buffer.bands() == 1 {
        (buffer.band(0).to_vec(), ColorType::L8)
    } else {
        (interleave(buffer, 3), ColorType::Rgb8)
    };

    let mut jpeg_data = Vec::new();
    let mut cursor = Cursor::new(&mut jpeg_data);
    let mut encoder = JpegEncoder::new_with_quality(&mut cursor, quality);
    encoder
        .encode(&pixels, buffer.width() as u32, buffer.height() as u32, color_type)
        .map_err(|e| TilerError::EncodeError(format!("Failed to encode JPEG: {}", e)))?;
    Ok(jpeg_data)
}

fn encode_webp(
    buffer: &PixelBuffer<u8>,
    mask: &ValidityMask,
    options: &EncoderOptions,
) -> TilerResult<Vec<u8>> {
    let rgba = to_rgba(buffer, mask);
    let encoder = webp::Encoder::from_rgba(&rgba, buffer.width() as u32, buffer.height() as u32);
    let webp_data = if options.webp_lossless {
        encoder.encode_lossless()
    } else {
        encoder.encode(options.webp_quality)
    };
    Ok(webp_data.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colormap::ColorTableSet;

    fn rgb_tile() -> (PixelBuffer<u8>, ValidityMask) {
        let buffer = PixelBuffer::from_planes(
            vec![vec![200, 0, 10, 20], vec![100, 0, 10, 20], vec![50, 0, 10, 20]],
            2,
            2,
        )
        .unwrap();
        let mask = ValidityMask::from_vec(vec![true, false, true, true], 2, 2).unwrap();
        (buffer, mask)
    }

    #[test]
    fn test_png_mask_becomes_alpha() {
        let (buffer, mask) = rgb_tile();
        let bytes = encode(&buffer, &mask, TileFormat::Png, None, &EncoderOptions::default()).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded.get_pixel(0, 0).0, [200, 100, 50, 255]);
        assert_eq!(decoded.get_pixel(1, 0).0[3], 0);
    }

    #[test]
    fn test_jpeg_dimensions() {
        let (buffer, mask) = rgb_tile();
        let bytes = encode(&buffer, &mask, TileFormat::Jpeg, None, &EncoderOptions::default()).unwrap();
        assert_eq!(&bytes[0..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (2, 2));
    }

    #[test]
    fn test_webp_header() {
        let (buffer, mask) = rgb_tile();
        let bytes = encode(&buffer, &mask, TileFormat::Webp, None, &EncoderOptions::default()).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WEBP");
    }

    #[test]
    fn test_color_table_applied_to_single_band() {
        let tables = ColorTableSet::builtin();
        let buffer = PixelBuffer::from_vec(vec![0u8, 255, 255, 0], 1, 2, 2).unwrap();
        let mask = ValidityMask::all_valid(2, 2);
        let bytes = encode(
            &buffer,
            &mask,
            TileFormat::Png,
            Some(tables.get("viridis").unwrap()),
            &EncoderOptions::default(),
        )
        .unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded.get_pixel(0, 0).0, [0x44, 0x01, 0x54, 255]);
        assert_eq!(decoded.get_pixel(1, 0).0, [0xfd, 0xe7, 0x25, 255]);
    }

    #[test]
    fn test_two_band_buffer_rejected() {
        let buffer: PixelBuffer<u8> = PixelBuffer::zeros(2, 2, 2);
        let mask = ValidityMask::all_valid(2, 2);
        assert!(encode(&buffer, &mask, TileFormat::Png, None, &EncoderOptions::default()).is_err());
    }
}
