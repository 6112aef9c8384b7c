//! Synthetic band planes.
//!
//! Planes are row-major `Vec<u16>` in the value range of CBERS digital
//! numbers, with 0 reserved for no-data.

/// Horizontal ramp from `min` at the left column to `max` at the right.
///
/// # Example
///
/// ```
/// use test_utils::gradient_plane;
///
/// let plane = gradient_plane(3, 2, 100, 300);
/// assert_eq!(plane, vec![100, 200, 300, 100, 200, 300]);
/// ```
pub fn gradient_plane(width: usize, height: usize, min: u16, max: u16) -> Vec<u16> {
    let span = max as f64 - min as f64;
    let steps = (width.max(2) - 1) as f64;
    let row: Vec<u16> = (0..width)
        .map(|col| (min as f64 + span * col as f64 / steps).round() as u16)
        .collect();
    row.repeat(height)
}

/// A plane filled with `value`.
pub fn constant_plane(width: usize, height: usize, value: u16) -> Vec<u16> {
    vec![value; width * height]
}

/// Zero the rectangle `[x0, x1) x [y0, y1)`.
pub fn with_nodata_hole(
    mut plane: Vec<u16>,
    width: usize,
    (x0, y0): (usize, usize),
    (x1, y1): (usize, usize),
) -> Vec<u16> {
    for y in y0..y1 {
        for x in x0..x1 {
            plane[y * width + x] = 0;
        }
    }
    plane
}

/// NIR and red planes (MUX bands 8 and 7) for vegetation index tests.
///
/// NIR is constant; red ramps from 1000 to 5000, so NDVI falls from 0.5
/// on the left edge to -0.25 on the right.
pub fn vegetation_planes(width: usize, height: usize) -> (Vec<u16>, Vec<u16>) {
    (
        constant_plane(width, height, 3000),
        gradient_plane(width, height, 1000, 5000),
    )
}
