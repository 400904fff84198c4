// mapping.rs — Bilinear blending of neighbouring tile mapping tables.
//
// Mapping every pixel through its own tile's table leaves visible seams
// at tile edges. Instead each pixel is blended from the tables of the (up
// to) four tiles whose centers surround it:
//
//        c(col-1)        c(col)         c(col+1)
//           ·──────────────·──────────────·
//                    p                         p left of c(col):  blend col-1, col
//                                 p            p right of c(col): blend col, col+1
//
// Weights are measured from tile centers, not tile edges, so a pixel on
// its own tile's center takes that tile's value with zero contribution
// from anything else. On the frame border the missing neighbour is the
// tile itself (weight 0), which is the nearest valid tile.
//
// Weights are fixed point with WEIGHT_BITS fractional bits:
//
//   top    = tl·(1-wx) + tr·wx
//   bottom = bl·(1-wx) + br·wx
//   out    = round(top·(1-wy) + bottom·wy)

use crate::buffers::{BufferManager, Lut};
use crate::config::Controls;
use crate::tile::{TileCoord, TileGrid};

/// Fractional bits of the interpolation weights.
pub const WEIGHT_BITS: u32 = 8;
/// Weight value representing 1.0.
pub const WEIGHT_ONE: u32 = 1 << WEIGHT_BITS;

/// Anything that can hand out a tile's current mapping table.
pub trait LutSource {
    fn lut(&self, tile: usize) -> &Lut;
}

impl LutSource for BufferManager {
    #[inline]
    fn lut(&self, tile: usize) -> &Lut {
        self.ready_lut(tile)
    }
}

impl LutSource for [Lut] {
    #[inline]
    fn lut(&self, tile: usize) -> &Lut {
        &self[tile]
    }
}

impl LutSource for Vec<Lut> {
    #[inline]
    fn lut(&self, tile: usize) -> &Lut {
        &self[tile]
    }
}

/// The four tiles a pixel blends and its weights toward the right/bottom pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbors {
    pub tl: usize,
    pub tr: usize,
    pub bl: usize,
    pub br: usize,
    /// Horizontal weight in `[0, WEIGHT_ONE)`.
    pub wx: u32,
    /// Vertical weight in `[0, WEIGHT_ONE)`.
    pub wy: u32,
}

/// Select the neighbour tiles of the pixel at `coord`.
pub fn neighbors(grid: &TileGrid, coord: &TileCoord) -> Neighbors {
    let x = grid.col_start(coord.col) + coord.local_x;
    let y = grid.row_start(coord.row) + coord.local_y;
    let (left, right, wx) = axis(x, coord.col, grid.cols(), |c| grid.center_x(c));
    let (top, bottom, wy) = axis(y, coord.row, grid.rows(), |r| grid.center_y(r));
    let cols = grid.cols();
    Neighbors {
        tl: top * cols + left,
        tr: top * cols + right,
        bl: bottom * cols + left,
        br: bottom * cols + right,
        wx,
        wy,
    }
}

// Lower/upper tile index along one axis and the weight of the upper one.
fn axis(pos: usize, own: usize, count: usize, center: impl Fn(usize) -> usize) -> (usize, usize, u32) {
    let c = center(own);
    let (lo, hi) = if pos < c {
        if own == 0 {
            return (own, own, 0);
        }
        (own - 1, own)
    } else {
        if own + 1 == count {
            return (own, own, 0);
        }
        (own, own + 1)
    };
    let from = center(lo);
    let span = center(hi) - from;
    let w = ((pos - from) as u32) * WEIGHT_ONE / span as u32;
    (lo, hi, w)
}

/// Blend four mapped values. Exact at the corners.
#[inline]
pub fn blend(tl: u8, tr: u8, bl: u8, br: u8, wx: u32, wy: u32) -> u8 {
    let top = tl as u32 * (WEIGHT_ONE - wx) + tr as u32 * wx;
    let bottom = bl as u32 * (WEIGHT_ONE - wx) + br as u32 * wx;
    let acc = top * (WEIGHT_ONE - wy) + bottom * wy;
    ((acc + (1 << (2 * WEIGHT_BITS - 1))) >> (2 * WEIGHT_BITS)) as u8
}

/// Maps one intensity through the tile tables under the current controls.
#[derive(Debug, Clone)]
pub struct MappingStage {
    grid: TileGrid,
}

impl MappingStage {
    pub fn new(grid: TileGrid) -> Self {
        MappingStage { grid }
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    /// Enhanced value for intensity `value` at `coord`.
    pub fn map<S: LutSource + ?Sized>(&self, luts: &S, coord: &TileCoord, value: u8, controls: &Controls) -> u8 {
        if !controls.equalization_enabled {
            return value;
        }
        let v = value as usize;
        if !controls.interpolation_enabled {
            return luts.lut(coord.index)[v];
        }
        let n = neighbors(&self.grid, coord);
        blend(
            luts.lut(n.tl)[v],
            luts.lut(n.tr)[v],
            luts.lut(n.bl)[v],
            luts.lut(n.br)[v],
            n.wx,
            n.wy,
        )
    }
}
