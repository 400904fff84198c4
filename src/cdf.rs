// cdf.rs — Contrast limiting and histogram → mapping table conversion.
//
// For each tile, once per frame:
//
//   1. Clip: every bin above clip_limit is cut to clip_limit and the cut
//      counts are summed into `excess`.
//   2. Redistribute: excess / 256 is added to every bin, and the remainder
//      goes one count each to the lowest bins. Total count is unchanged.
//   3. CDF: running prefix sum; cdf_min is the first non-zero entry,
//      cdf_max the last.
//   4. Normalize: lut[i] = round((cdf[i] - cdf_min) * 255 / (cdf_max - cdf_min)).
//      A zero range (single-valued tile) yields the identity table.
//
// Reference: Zuiderveld (1994), "Contrast Limited Adaptive Histogram
// Equalization", Graphics Gems IV.
//
// The pure functions below do the math. `ClipCdfEngine` runs them as an
// explicit state machine over all tiles in ascending order, one state per
// `step`, so the pipeline can spread the work across blanking ticks.

use log::debug;

use crate::buffers::{BufferManager, Histogram, Lut, BINS, IDENTITY_LUT};
use crate::error::Result;
use crate::tile::TileGrid;

/// Running prefix sum of a histogram.
pub type Cdf = [u32; BINS];

// ============================================================
// Math
// ============================================================

/// Per-bin clip limit for a tile of `tile_pixels` pixels.
#[inline]
pub fn clip_limit(tile_pixels: u32, clip_threshold: u32) -> u32 {
    (tile_pixels / BINS as u32).saturating_mul(clip_threshold)
}

/// Clamp every bin to `limit`; return the total removed.
pub fn clip_histogram(hist: &mut Histogram, limit: u32) -> u32 {
    let mut excess = 0u32;
    for bin in hist.iter_mut() {
        if *bin > limit {
            excess += *bin - limit;
            *bin = limit;
        }
    }
    excess
}

/// Spread `excess` evenly over all bins, remainder to the lowest bins.
pub fn redistribute(hist: &mut Histogram, excess: u32) {
    let per_bin = excess / BINS as u32;
    let remainder = (excess % BINS as u32) as usize;
    for (i, bin) in hist.iter_mut().enumerate() {
        *bin += per_bin;
        if i < remainder {
            *bin += 1;
        }
    }
}

/// Prefix sum over the bins.
pub fn cumulative(hist: &Histogram) -> Cdf {
    let mut cdf = [0u32; BINS];
    let mut acc = 0u32;
    for (c, &h) in cdf.iter_mut().zip(hist) {
        acc += h;
        *c = acc;
    }
    cdf
}

/// First non-zero CDF entry (0 if the histogram is empty) and the last entry.
pub fn cdf_bounds(cdf: &Cdf) -> (u32, u32) {
    let min = cdf.iter().copied().find(|&c| c > 0).unwrap_or(0);
    (min, cdf[BINS - 1])
}

/// Scale a CDF into a mapping table. Rounds half up; identity when the
/// range is empty.
pub fn normalize(cdf: &Cdf, cdf_min: u32, cdf_max: u32) -> Lut {
    let range = (cdf_max - cdf_min) as u64;
    if range == 0 {
        return IDENTITY_LUT;
    }
    let mut lut = [0u8; BINS];
    for (out, &c) in lut.iter_mut().zip(cdf) {
        let num = c.saturating_sub(cdf_min) as u64 * 255;
        *out = ((2 * num + range) / (2 * range)) as u8;
    }
    lut
}

/// All four stages for one histogram.
pub fn build_lut(hist: &Histogram, tile_pixels: u32, clip_threshold: u32) -> Lut {
    let mut clipped = *hist;
    let excess = clip_histogram(&mut clipped, clip_limit(tile_pixels, clip_threshold));
    redistribute(&mut clipped, excess);
    let cdf = cumulative(&clipped);
    let (min, max) = cdf_bounds(&cdf);
    normalize(&cdf, min, max)
}

// ============================================================
// Engine
// ============================================================

/// Engine state. `ReadHist → … → NextTile` repeats once per tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Waiting for a completed frame.
    Idle,
    ReadHist,
    ClipScan,
    ClipRedist,
    CalcCdf,
    WriteLut,
    NextTile,
    /// All tiles flipped; mapping tables ready.
    Done,
}

/// Per-frame clip/CDF processor for every tile.
#[derive(Debug, Clone)]
pub struct ClipCdfEngine {
    state: EngineState,
    tile: usize,
    tile_pixels: Vec<u32>,
    clip_threshold: u32,
    hist: Histogram,
    cdf: Cdf,
    excess: u32,
    cdf_min: u32,
    cdf_max: u32,
}

impl ClipCdfEngine {
    pub fn new(grid: &TileGrid) -> Self {
        ClipCdfEngine {
            state: EngineState::Idle,
            tile: 0,
            tile_pixels: (0..grid.tile_count()).map(|t| grid.tile_pixel_count(t)).collect(),
            clip_threshold: 0,
            hist: [0; BINS],
            cdf: [0; BINS],
            excess: 0,
            cdf_min: 0,
            cdf_max: 0,
        }
    }

    /// Abandon any frame in progress.
    pub fn reset(&mut self) {
        self.state = EngineState::Idle;
        self.tile = 0;
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Tile under the cursor.
    pub fn tile(&self) -> usize {
        self.tile
    }

    /// True between `start` and `Done`.
    pub fn is_busy(&self) -> bool {
        !matches!(self.state, EngineState::Idle | EngineState::Done)
    }

    /// Begin processing a completed frame from tile 0.
    pub fn start(&mut self, clip_threshold: u32) {
        debug_assert!(!self.is_busy(), "clip/CDF engine restarted mid-frame");
        self.clip_threshold = clip_threshold;
        self.tile = 0;
        self.state = EngineState::ReadHist;
    }

    /// Perform one state's work and advance.
    pub fn step(&mut self, buffers: &mut BufferManager) -> Result<EngineState> {
        self.state = match self.state {
            EngineState::Idle | EngineState::Done => self.state,
            EngineState::ReadHist => {
                self.hist = buffers.claim_for_cdf(self.tile)?;
                EngineState::ClipScan
            }
            EngineState::ClipScan => {
                let limit = clip_limit(self.tile_pixels[self.tile], self.clip_threshold);
                self.excess = clip_histogram(&mut self.hist, limit);
                EngineState::ClipRedist
            }
            EngineState::ClipRedist => {
                redistribute(&mut self.hist, self.excess);
                EngineState::CalcCdf
            }
            EngineState::CalcCdf => {
                self.cdf = cumulative(&self.hist);
                (self.cdf_min, self.cdf_max) = cdf_bounds(&self.cdf);
                EngineState::WriteLut
            }
            EngineState::WriteLut => {
                let lut = normalize(&self.cdf, self.cdf_min, self.cdf_max);
                buffers.publish_lut(self.tile, &lut)?;
                EngineState::NextTile
            }
            EngineState::NextTile => {
                self.tile += 1;
                if self.tile == self.tile_pixels.len() {
                    debug!("mapping tables ready for {} tiles", self.tile);
                    EngineState::Done
                } else {
                    EngineState::ReadHist
                }
            }
        };
        Ok(self.state)
    }

    /// Run up to `budget` steps (0 = until done). Returns true when the
    /// frame finished during this call.
    pub fn run(&mut self, buffers: &mut BufferManager, budget: usize) -> Result<bool> {
        let mut steps = 0;
        while self.is_busy() && (budget == 0 || steps < budget) {
            self.step(buffers)?;
            steps += 1;
        }
        Ok(steps > 0 && self.state == EngineState::Done)
    }
}
