//! PNG writer for interleaved 8-bit tiles.
//!
//! Tiles with at most 256 distinct RGBA colors (colormapped products and
//! most masked tiles) are written as indexed PNG with a `tRNS` chunk. All
//! others fall back to truecolor RGBA. Grayscale is written as-is.

use rayon::prelude::*;
use std::collections::HashMap;
use std::io::Write;

use tiler_common::{TilerError, TilerResult};

const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

/// Maximum colors for indexed PNG
const MAX_PALETTE_SIZE: usize = 256;

/// Below this many pixels, index mapping stays on the calling thread.
const PARALLEL_THRESHOLD: usize = 4096;

/// IHDR color type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PngColorType {
    Gray = 0,
    Rgb = 2,
    Indexed = 3,
    GrayAlpha = 4,
    Rgba = 6,
}

impl PngColorType {
    fn bytes_per_pixel(self) -> usize {
        match self {
            PngColorType::Gray | PngColorType::Indexed => 1,
            PngColorType::GrayAlpha => 2,
            PngColorType::Rgb => 3,
            PngColorType::Rgba => 4,
        }
    }
}

/// Write RGBA pixels, choosing indexed output when the colors fit a palette.
pub fn encode_rgba_auto(pixels: &[u8], width: usize, height: usize) -> TilerResult<Vec<u8>> {
    check_len(pixels, width, height, 4)?;
    match extract_palette(pixels) {
        Some((palette, indices)) => encode_indexed(&palette, &indices, width, height),
        None => encode(pixels, width, height, PngColorType::Rgba),
    }
}

/// Write an indexed PNG from a palette and one index per pixel.
pub fn encode_indexed(
    palette: &[[u8; 4]],
    indices: &[u8],
    width: usize,
    height: usize,
) -> TilerResult<Vec<u8>> {
    if palette.is_empty() || palette.len() > MAX_PALETTE_SIZE {
        return Err(TilerError::EncodeError(format!(
            "palette must hold 1 to {} colors, got {}",
            MAX_PALETTE_SIZE,
            palette.len()
        )));
    }
    check_len(indices, width, height, 1)?;

    let mut png = Vec::with_capacity(indices.len() / 2 + palette.len() * 4 + 64);
    png.extend_from_slice(&PNG_SIGNATURE);
    write_chunk(&mut png, b"IHDR", &ihdr(width, height, PngColorType::Indexed));

    let plte: Vec<u8> = palette.iter().flat_map(|c| [c[0], c[1], c[2]]).collect();
    write_chunk(&mut png, b"PLTE", &plte);

    if palette.iter().any(|c| c[3] < 255) {
        let trns: Vec<u8> = palette.iter().map(|c| c[3]).collect();
        write_chunk(&mut png, b"tRNS", &trns);
    }

    let idat = deflate_scanlines(indices, width, height, 1)?;
    write_chunk(&mut png, b"IDAT", &idat);
    write_chunk(&mut png, b"IEND", &[]);
    Ok(png)
}

/// Write interleaved pixels of the given color type (not `Indexed`).
pub fn encode(
    pixels: &[u8],
    width: usize,
    height: usize,
    color_type: PngColorType,
) -> TilerResult<Vec<u8>> {
    if color_type == PngColorType::Indexed {
        return Err(TilerError::EncodeError(
            "indexed PNG needs a palette".to_string(),
        ));
    }
    let bpp = color_type.bytes_per_pixel();
    check_len(pixels, width, height, bpp)?;

    let mut png = Vec::with_capacity(pixels.len() / 2 + 64);
    png.extend_from_slice(&PNG_SIGNATURE);
    write_chunk(&mut png, b"IHDR", &ihdr(width, height, color_type));
    let idat = deflate_scanlines(pixels, width, height, bpp)?;
    write_chunk(&mut png, b"IDAT", &idat);
    write_chunk(&mut png, b"IEND", &[]);
    Ok(png)
}

fn check_len(data: &[u8], width: usize, height: usize, bpp: usize) -> TilerResult<()> {
    if width == 0 || height == 0 || data.len() != width * height * bpp {
        return Err(TilerError::EncodeError(format!(
            "{} bytes do not describe a {}x{} image at {} bytes per pixel",
            data.len(),
            width,
            height,
            bpp
        )));
    }
    Ok(())
}

fn ihdr(width: usize, height: usize, color_type: PngColorType) -> [u8; 13] {
    let mut data = [0u8; 13];
    data[0..4].copy_from_slice(&(width as u32).to_be_bytes());
    data[4..8].copy_from_slice(&(height as u32).to_be_bytes());
    data[8] = 8; // bit depth
    data[9] = color_type as u8;
    // compression, filter and interlace methods stay 0
    data
}

/// Pack RGBA bytes into a u32 for hashing
#[inline(always)]
fn pack_color(pixel: &[u8]) -> u32 {
    u32::from_le_bytes([pixel[0], pixel[1], pixel[2], pixel[3]])
}

/// Palette and per-pixel indices, or `None` past 256 distinct colors.
///
/// Palette order is first-seen order, so output is deterministic.
pub fn extract_palette(pixels: &[u8]) -> Option<(Vec<[u8; 4]>, Vec<u8>)> {
    let mut lookup: HashMap<u32, u8> = HashMap::with_capacity(MAX_PALETTE_SIZE);
    let mut palette: Vec<[u8; 4]> = Vec::with_capacity(MAX_PALETTE_SIZE);

    for pixel in pixels.chunks_exact(4) {
        let packed = pack_color(pixel);
        if lookup.contains_key(&packed) {
            continue;
        }
        if palette.len() == MAX_PALETTE_SIZE {
            return None;
        }
        lookup.insert(packed, palette.len() as u8);
        palette.push([pixel[0], pixel[1], pixel[2], pixel[3]]);
    }

    let index_of = |pixel: &[u8]| lookup.get(&pack_color(pixel)).copied().unwrap_or(0);
    let indices: Vec<u8> = if pixels.len() / 4 >= PARALLEL_THRESHOLD {
        pixels.par_chunks_exact(4).map(index_of).collect()
    } else {
        pixels.chunks_exact(4).map(index_of).collect()
    };

    Some((palette, indices))
}

/// Prefix each row with filter byte 0 and zlib-compress.
fn deflate_scanlines(data: &[u8], width: usize, height: usize, bpp: usize) -> TilerResult<Vec<u8>> {
    let stride = width * bpp;
    let mut raw = Vec::with_capacity(height * (stride + 1));
    for row in data.chunks_exact(stride) {
        raw.push(0);
        raw.extend_from_slice(row);
    }

    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::fast());
    encoder.write_all(&raw).map_err(idat_error)?;
    encoder.finish().map_err(idat_error)
}

fn idat_error(e: std::io::Error) -> TilerError {
    TilerError::EncodeError(format!("IDAT compression failed: {}", e))
}

/// Length, type, data, CRC over type and data.
fn write_chunk(png: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(chunk_type);
    png.extend_from_slice(data);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(chunk_type);
    hasher.update(data);
    png.extend_from_slice(&hasher.finalize().to_be_bytes());
}
