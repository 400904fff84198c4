// reference.rs — Whole-frame CLAHE using the same arithmetic as the stream.
//
// The streaming pipeline maps frame N with tables built from frame N-1.
// This model builds the tables from the frame itself and maps it in one
// go, which makes it a golden reference: feeding the same frame twice
// through the pipeline must reproduce `equalize_frame` exactly on the
// second pass.

use crate::buffers::{Histogram, Lut, BINS};
use crate::cdf::build_lut;
use crate::config::Controls;
use crate::image::Image;
use crate::mapping::MappingStage;
use crate::tile::TileGrid;

/// Per-tile histograms of a whole frame.
pub fn tile_histograms(image: &Image, grid: &TileGrid) -> Vec<Histogram> {
    let mut hists = vec![[0u32; BINS]; grid.tile_count()];
    for y in 0..image.height() {
        for (x, &v) in image.row(y).iter().enumerate() {
            hists[grid.locate(x, y).index][v as usize] += 1;
        }
    }
    hists
}

/// Per-tile mapping tables of a whole frame.
pub fn tile_luts(image: &Image, grid: &TileGrid, clip_threshold: u32) -> Vec<Lut> {
    tile_histograms(image, grid)
        .iter()
        .enumerate()
        .map(|(t, h)| build_lut(h, grid.tile_pixel_count(t), clip_threshold))
        .collect()
}

/// Equalize `image` with tables computed from itself.
///
/// # Panics
/// Panics if `image` does not match the grid's frame size.
pub fn equalize_frame(image: &Image, grid: &TileGrid, controls: &Controls) -> Image {
    let luts = tile_luts(image, grid, controls.clip_threshold);
    let stage = MappingStage::new(grid.clone());
    Image::from_fn(image.width(), image.height(), |x, y| {
        stage.map(&luts, &grid.locate(x, y), image.get(x, y), controls)
    })
}

/// Blockiness across internal tile boundaries.
///
/// For every boundary, the absolute difference between the mean of the two
/// pixel columns (or rows) just after it and the two just before it,
/// averaged over all boundaries. 0.0 for a single-tile grid.
pub fn seam_score(image: &Image, grid: &TileGrid) -> f64 {
    const STRIP: usize = 2;
    let (w, h) = (image.width(), image.height());
    let mut jumps = Vec::new();

    for col in 1..grid.cols() {
        let bx = grid.col_start(col);
        let n = STRIP.min(bx).min(w - bx);
        let left = mean_of(image, bx - n..bx, 0..h);
        let right = mean_of(image, bx..bx + n, 0..h);
        jumps.push((right - left).abs());
    }
    for row in 1..grid.rows() {
        let by = grid.row_start(row);
        let n = STRIP.min(by).min(h - by);
        let above = mean_of(image, 0..w, by - n..by);
        let below = mean_of(image, 0..w, by..by + n);
        jumps.push((below - above).abs());
    }

    if jumps.is_empty() {
        return 0.0;
    }
    jumps.iter().sum::<f64>() / jumps.len() as f64
}

fn mean_of(image: &Image, xs: std::ops::Range<usize>, ys: std::ops::Range<usize>) -> f64 {
    let count = xs.len() * ys.len();
    if count == 0 {
        return 0.0;
    }
    let sum: u64 = ys
        .flat_map(|y| image.row(y)[xs.clone()].iter().map(|&v| v as u64))
        .sum();
    sum as f64 / count as f64
}
