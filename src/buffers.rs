// buffers.rs — Two-generation (ping-pong) state per tile.
//
// Each tile owns exactly two slots. One is the accumulate side, the other
// is the ready side whose mapping table the output stage reads:
//
//             frame N                 boundary             frame N+1
//   slot 0:   Live (counting)   →  Finalized → Processing  →  Ready (LUT N)
//   slot 1:   Ready (LUT N-1)   ─────────────────────────  →  Live (cleared)
//
// The swap is a toggle of `live`, never a copy. The ready slot is always
// `live ^ 1`, so the mapping stage keeps reading the previous table right
// up to the flip and never sees a half-written one.
//
// Role checks are enforced here rather than trusted to the callers: a
// write into a slot the engine is processing, or an engine read of a slot
// still counting, is reported as `Error::RoleViolation`.

use log::trace;

use crate::error::{Error, Result};

/// Number of intensity bins per tile.
pub const BINS: usize = 256;

/// Per-tile bin counts.
pub type Histogram = [u32; BINS];

/// Per-tile intensity mapping table.
pub type Lut = [u8; BINS];

/// The identity mapping, used until a tile's first table is built.
pub const IDENTITY_LUT: Lut = identity_lut();

const fn identity_lut() -> Lut {
    let mut lut = [0u8; BINS];
    let mut i = 0;
    while i < BINS {
        lut[i] = i as u8;
        i += 1;
    }
    lut
}

/// What a generation slot is currently used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Accepting histogram increments.
    Live,
    /// Pixel count reached; trailing in-flight writes may still land.
    Finalized,
    /// Bins handed to the clip/CDF engine; no more writes.
    Processing,
    /// Mapping table complete and readable by the output stage.
    Ready,
}

#[derive(Debug, Clone)]
struct Generation {
    bins: Histogram,
    lut: Lut,
    role: Role,
}

impl Generation {
    fn new(role: Role) -> Self {
        Generation {
            bins: [0; BINS],
            lut: IDENTITY_LUT,
            role,
        }
    }
}

#[derive(Debug, Clone)]
struct TileSlots {
    gens: [Generation; 2],
    live: usize,
}

impl TileSlots {
    fn new() -> Self {
        TileSlots {
            gens: [Generation::new(Role::Live), Generation::new(Role::Ready)],
            live: 0,
        }
    }
}

/// Arena of two generation slots per tile plus a role index each.
#[derive(Debug, Clone)]
pub struct BufferManager {
    tiles: Vec<TileSlots>,
}

impl BufferManager {
    pub fn new(tile_count: usize) -> Self {
        BufferManager {
            tiles: (0..tile_count).map(|_| TileSlots::new()).collect(),
        }
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Zero both generations of `tile` and restore the identity tables.
    pub fn clear_tile(&mut self, tile: usize) {
        self.tiles[tile] = TileSlots::new();
    }

    /// Slot currently on the accumulate side.
    #[inline]
    pub fn live_generation(&self, tile: usize) -> usize {
        self.tiles[tile].live
    }

    /// Role of one slot.
    #[inline]
    pub fn role(&self, tile: usize, generation: usize) -> Role {
        self.tiles[tile].gens[generation].role
    }

    /// Read a bin for a read-modify-write. Live or Finalized slots only.
    pub fn read_bin(&self, tile: usize, generation: usize, bin: u8) -> Result<u32> {
        let g = self.accumulating(tile, generation, "read bin")?;
        Ok(g.bins[bin as usize])
    }

    /// Write back an incremented bin. Live or Finalized slots only.
    pub fn write_bin(&mut self, tile: usize, generation: usize, bin: u8, value: u32) -> Result<()> {
        self.accumulating(tile, generation, "write bin")?;
        self.tiles[tile].gens[generation].bins[bin as usize] = value;
        Ok(())
    }

    /// Mark the live slot of `tile` as holding a complete frame.
    pub fn finalize(&mut self, tile: usize) -> Result<()> {
        let generation = self.tiles[tile].live;
        let g = &mut self.tiles[tile].gens[generation];
        if g.role != Role::Live {
            return Err(role_error(tile, generation, "finalize", g.role));
        }
        g.role = Role::Finalized;
        Ok(())
    }

    /// Hand the finalized histogram of `tile` to the clip/CDF engine.
    pub fn claim_for_cdf(&mut self, tile: usize) -> Result<Histogram> {
        let generation = self.tiles[tile].live;
        let g = &mut self.tiles[tile].gens[generation];
        if g.role != Role::Finalized {
            return Err(role_error(tile, generation, "claim for clip/CDF", g.role));
        }
        g.role = Role::Processing;
        Ok(g.bins)
    }

    /// Store the finished mapping table and swap the slot roles of `tile`:
    /// the processed slot becomes ready, the old ready slot becomes live
    /// with a zeroed histogram.
    pub fn publish_lut(&mut self, tile: usize, lut: &Lut) -> Result<()> {
        let slots = &mut self.tiles[tile];
        let processed = slots.live;
        let role = slots.gens[processed].role;
        if role != Role::Processing {
            return Err(role_error(tile, processed, "publish mapping table", role));
        }
        slots.gens[processed].lut = *lut;
        slots.gens[processed].role = Role::Ready;

        let next = processed ^ 1;
        slots.gens[next].bins = [0; BINS];
        slots.gens[next].role = Role::Live;
        slots.live = next;
        trace!("tile {tile}: generation {processed} ready, generation {next} live");
        Ok(())
    }

    /// Mapping table of the ready slot.
    #[inline]
    pub fn ready_lut(&self, tile: usize) -> &Lut {
        let slots = &self.tiles[tile];
        &slots.gens[slots.live ^ 1].lut
    }

    /// Bins of one slot, for inspection.
    pub fn histogram(&self, tile: usize, generation: usize) -> &Histogram {
        &self.tiles[tile].gens[generation].bins
    }

    /// First tile whose live slot is not accepting new-frame samples.
    pub fn first_pending(&self) -> Option<usize> {
        self.tiles
            .iter()
            .position(|t| t.gens[t.live].role != Role::Live)
    }

    fn accumulating(&self, tile: usize, generation: usize, operation: &'static str) -> Result<&Generation> {
        let g = &self.tiles[tile].gens[generation];
        match g.role {
            Role::Live | Role::Finalized => Ok(g),
            role => Err(role_error(tile, generation, operation, role)),
        }
    }
}

fn role_error(tile: usize, generation: usize, operation: &'static str, role: Role) -> Error {
    Error::RoleViolation {
        tile,
        generation,
        operation,
        role,
    }
}
