// histogram.rs — Per-tile histogram accumulation over the sample stream.
//
// Every active sample increments one bin of its tile's live generation.
// The increment is a read-modify-write whose write lands `latency` ticks
// after the read, as in a pipelined block-RAM update:
//
//   tick:      t        t+1       t+2       t+3
//   sample A:  read K   (+1)      (hold)    write K
//   sample B:            read K   ...                 ← sees the stale K
//
// Two samples hitting the same (tile, bin) inside that window would lose
// an update with a plain read. The forwarding window resolves it within
// the same tick, without stalls:
//
// - Newest in-flight write has the same key → add 1 to it in place and
//   let this tick's slot be a bubble (the "+2" fast path).
// - An older in-flight write has the key → take its pending value as the
//   read result instead of memory (forwarding).
//
// The window holds one slot per tick, so its length equals the latency and
// it generalizes to any depth.
//
// Completion: each tile counts its pixels. Hitting the expected count
// finalizes that tile's live generation; once every tile is finalized the
// window is drained so all writes are in memory before the clip/CDF engine
// reads anything.

use std::collections::VecDeque;

use log::debug;

use crate::buffers::{BufferManager, Role};
use crate::error::{Error, Result};
use crate::tile::TileGrid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingWrite {
    tile: usize,
    generation: usize,
    bin: u8,
    value: u32,
}

impl PendingWrite {
    #[inline]
    fn same_key(&self, tile: usize, generation: usize, bin: u8) -> bool {
        self.tile == tile && self.generation == generation && self.bin == bin
    }
}

/// What one accumulator step produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing notable.
    Idle,
    /// The sample's tile reached its pixel count.
    TileFinalized(usize),
    /// Every tile is finalized and all writes are committed.
    FrameComplete,
}

/// Hazard statistics, for verification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HazardStats {
    /// Increments folded into the newest in-flight write.
    pub coalesced: u64,
    /// Reads served from an older in-flight write.
    pub forwarded: u64,
}

/// Histogram accumulator for all tiles.
#[derive(Debug, Clone)]
pub struct Accumulator {
    window: VecDeque<Option<PendingWrite>>,
    latency: usize,
    counts: Vec<u32>,
    expected: Vec<u32>,
    finalized: usize,
    stats: HazardStats,
    bypass: bool,
}

impl Accumulator {
    pub fn new(grid: &TileGrid, latency: usize) -> Self {
        let expected = (0..grid.tile_count())
            .map(|t| grid.tile_pixel_count(t))
            .collect::<Vec<_>>();
        Accumulator {
            window: VecDeque::with_capacity(latency),
            latency,
            counts: vec![0; expected.len()],
            expected,
            finalized: 0,
            stats: HazardStats::default(),
            bypass: true,
        }
    }

    /// Drop all in-flight writes and counters.
    pub fn reset(&mut self) {
        self.window.clear();
        self.counts.fill(0);
        self.finalized = 0;
        self.stats = HazardStats::default();
    }

    pub fn stats(&self) -> HazardStats {
        self.stats
    }

    /// Pixels counted so far for `tile` in the current frame.
    pub fn count(&self, tile: usize) -> u32 {
        self.counts[tile]
    }

    /// True when some tile has samples of an unfinished frame.
    pub fn has_partial_frame(&self) -> bool {
        self.finalized > 0 || self.counts.iter().any(|&c| c > 0)
    }

    /// First tile that has not reached its pixel count, as an error.
    pub fn incomplete_error(&self) -> Option<Error> {
        self.counts
            .iter()
            .zip(&self.expected)
            .enumerate()
            .find(|(_, (c, e))| c < e)
            .map(|(tile, (&counted, &expected))| Error::IncompleteFrame {
                tile,
                counted,
                expected,
            })
    }

    /// Advance one tick. `input` is the tile and intensity of an active
    /// sample, or `None` during blanking.
    pub fn step(&mut self, buffers: &mut BufferManager, input: Option<(usize, u8)>) -> Result<Outcome> {
        // Writes whose latency has elapsed land before this tick's read.
        if self.window.len() == self.latency {
            if let Some(Some(w)) = self.window.pop_front() {
                buffers.write_bin(w.tile, w.generation, w.bin, w.value)?;
            }
        }

        let Some((tile, bin)) = input else {
            self.push(None);
            return Ok(Outcome::Idle);
        };

        let generation = buffers.live_generation(tile);
        if buffers.role(tile, generation) != Role::Live {
            return Err(Error::FrameOverrun { tile });
        }

        self.increment(buffers, tile, generation, bin)?;

        self.counts[tile] += 1;
        if self.counts[tile] < self.expected[tile] {
            return Ok(Outcome::Idle);
        }

        buffers.finalize(tile)?;
        self.finalized += 1;
        if self.finalized < self.counts.len() {
            return Ok(Outcome::TileFinalized(tile));
        }

        self.drain(buffers)?;
        self.counts.fill(0);
        self.finalized = 0;
        debug!(
            "histograms complete: {} coalesced, {} forwarded",
            self.stats.coalesced, self.stats.forwarded
        );
        Ok(Outcome::FrameComplete)
    }

    fn increment(&mut self, buffers: &BufferManager, tile: usize, generation: usize, bin: u8) -> Result<()> {
        if self.bypass {
            // Newest slot first: the most recent pending value wins.
            if let Some(Some(newest)) = self.window.back_mut() {
                if newest.same_key(tile, generation, bin) {
                    newest.value += 1;
                    self.stats.coalesced += 1;
                    self.push(None);
                    return Ok(());
                }
            }
            let forwarded = self
                .window
                .iter()
                .rev()
                .flatten()
                .find(|w| w.same_key(tile, generation, bin))
                .map(|w| w.value);
            if let Some(value) = forwarded {
                self.stats.forwarded += 1;
                self.push(Some(PendingWrite { tile, generation, bin, value: value + 1 }));
                return Ok(());
            }
        }

        let value = buffers.read_bin(tile, generation, bin)? + 1;
        self.push(Some(PendingWrite { tile, generation, bin, value }));
        Ok(())
    }

    // `step` retires the oldest slot first, so the window never exceeds
    // `latency` entries.
    #[inline]
    fn push(&mut self, slot: Option<PendingWrite>) {
        self.window.push_back(slot);
    }

    /// Commit every in-flight write in issue order.
    pub fn drain(&mut self, buffers: &mut BufferManager) -> Result<()> {
        while let Some(slot) = self.window.pop_front() {
            if let Some(w) = slot {
                buffers.write_bin(w.tile, w.generation, w.bin, w.value)?;
            }
        }
        Ok(())
    }

    #[cfg(test)]
    fn without_bypass(mut self) -> Self {
        self.bypass = false;
        self
    }
}
