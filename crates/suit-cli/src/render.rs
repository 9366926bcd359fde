//! Colour-mapped PNG preview of a combined grid.

use std::path::Path;

use anyhow::{Context, Result};
use suit_core::Grid;

/// Viridis control points, evenly spaced from 0 to 1.
const VIRIDIS: [[u8; 3]; 9] = [
    [68, 1, 84],
    [71, 44, 122],
    [59, 81, 139],
    [44, 113, 142],
    [33, 144, 141],
    [39, 173, 129],
    [92, 200, 99],
    [170, 220, 50],
    [253, 231, 37],
];

/// Value in [0, 1] → viridis RGB, linearly interpolated between control points.
pub fn viridis(t: f32) -> [u8; 3] {
    let t = t.clamp(0.0, 1.0) * (VIRIDIS.len() - 1) as f32;
    let i = (t.floor() as usize).min(VIRIDIS.len() - 2);
    let frac = t - i as f32;
    let (lo, hi) = (VIRIDIS[i], VIRIDIS[i + 1]);
    let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * frac).round() as u8;
    [mix(lo[0], hi[0]), mix(lo[1], hi[1]), mix(lo[2], hi[2])]
}

/// Render the grid scaled to its finite min/max; non-finite cells are transparent.
pub fn to_image(grid: &Grid) -> image::RgbaImage {
    let lo = grid.min_value().unwrap_or(0.0);
    let hi = grid.max_value().unwrap_or(1.0);
    let range = if hi > lo { hi - lo } else { 1.0 };

    let mut img = image::RgbaImage::new(grid.cols as u32, grid.rows as u32);
    for r in 0..grid.rows {
        for c in 0..grid.cols {
            let v = grid.get(r, c);
            let px = if v.is_finite() {
                let [rv, gv, bv] = viridis((v - lo) / range);
                image::Rgba([rv, gv, bv, 255])
            } else {
                image::Rgba([0, 0, 0, 0])
            };
            img.put_pixel(c as u32, r as u32, px);
        }
    }
    img
}

pub fn write_preview(grid: &Grid, path: &Path) -> Result<()> {
    to_image(grid)
        .save(path)
        .with_context(|| format!("Cannot write preview {}", path.display()))
}
