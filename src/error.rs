// error.rs — Error taxonomy for the streaming equalizer.
//
// Two families live here:
//
// - Configuration errors (bad geometry, unreadable YAML). Returned from
//   constructors; the pipeline never starts.
// - Stream timing errors (frame boundary too early, row too short, samples
//   outside the frame, a new frame racing the clip/CDF engine). These are
//   fatal: the pipeline halts and every later tick reports `Halted` until
//   `reset()`. A half-filled histogram is never treated as complete.
//
// Degenerate tiles (flat histogram range) are not errors at all; the engine
// falls back to the identity mapping.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the equalization pipeline.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration values are inconsistent or out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    ConfigIo {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid YAML for `ClaheConfig`.
    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// A valid sample arrived while the post-reset clearing sweep was running.
    #[error("sample arrived before reset sweep finished ({remaining} tiles left)")]
    NotReady {
        /// Tiles still waiting to be cleared.
        remaining: usize,
    },

    /// The pipeline stopped after a fatal error and needs `reset()`.
    #[error("pipeline halted after a fatal error; reset required")]
    Halted,

    /// Frame boundary asserted before a tile collected all of its pixels.
    #[error("frame ended early: tile {tile} counted {counted} of {expected} pixels")]
    IncompleteFrame {
        /// First tile found short.
        tile: usize,
        /// Pixels accumulated for it.
        counted: u32,
        /// Pixels the tile geometry requires.
        expected: u32,
    },

    /// A valid sample fell outside the configured frame.
    #[error("sample at ({x}, {y}) lies outside the configured frame")]
    RasterOverflow {
        /// Column of the offending sample.
        x: usize,
        /// Row of the offending sample.
        y: usize,
    },

    /// A row ended with fewer samples than the frame width.
    #[error("row {y} ended after {got} samples, expected {expected}")]
    ShortRow {
        /// Row index.
        y: usize,
        /// Samples received.
        got: usize,
        /// Configured width.
        expected: usize,
    },

    /// An unbroken run of active samples did not end on a row boundary
    /// and was longer than one row. Runs of whole rows are fine since rows
    /// wrap at the frame width.
    #[error("active run starting on row {y} ended after {got} samples, not a multiple of width {expected}")]
    LongRow {
        /// Row the run started on.
        y: usize,
        /// Samples in the run.
        got: usize,
        /// Configured width.
        expected: usize,
    },

    /// A new frame started while some tile's previous histogram was still
    /// being turned into a mapping table. Reported for the first such tile,
    /// even if the incoming sample belongs to another one, since bilinear
    /// blending reads neighbouring tables too.
    #[error("new frame started before the mapping table of tile {tile} was built")]
    FrameOverrun {
        /// Tile index.
        tile: usize,
    },

    /// A generation was accessed in a role it does not currently hold.
    #[error("tile {tile} generation {generation}: {operation} not allowed while {role:?}")]
    RoleViolation {
        /// Tile index.
        tile: usize,
        /// Generation slot (0 or 1).
        generation: usize,
        /// What was attempted.
        operation: &'static str,
        /// Role the slot held at the time.
        role: crate::buffers::Role,
    },

    /// A frame handed to the raster driver has the wrong size.
    #[error("frame is {got_w}x{got_h}, pipeline expects {want_w}x{want_h}")]
    DimensionMismatch {
        /// Supplied width.
        got_w: usize,
        /// Supplied height.
        got_h: usize,
        /// Configured width.
        want_w: usize,
        /// Configured height.
        want_h: usize,
    },
}

impl Error {
    /// Whether this error stops the pipeline until the next reset.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::IncompleteFrame { .. }
                | Error::RasterOverflow { .. }
                | Error::ShortRow { .. }
                | Error::LongRow { .. }
                | Error::FrameOverrun { .. }
                | Error::RoleViolation { .. }
        )
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;
