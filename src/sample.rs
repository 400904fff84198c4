// sample.rs — One tick of the pixel stream, and raster position tracking.
//
// The stream carries no coordinates. Position is recovered from the two
// validity markers, the way a video timing generator would be read:
//
//   frame_valid  ‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾\______
//   row_valid    ___/‾‾‾‾‾‾‾‾‾‾\____/‾‾‾‾‾‾‾‾‾‾\____ ... /‾‾‾‾‾‾\________
//                    row 0           row 1                last row
//
// A sample is active when both markers are high. Rows wrap automatically
// once `width` active samples have been seen, so horizontal blanking is
// optional; a row that ends early is a timing error. The falling edge of
// frame_valid is the frame boundary.

use crate::error::{Error, Result};

/// One element of the input or output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sample {
    /// Intensity (luma).
    pub luma: u8,
    /// Side-channel data (U, V) delayed with the luma value.
    pub chroma: [u8; 2],
    /// Low during horizontal blanking.
    pub row_valid: bool,
    /// Low during vertical blanking.
    pub frame_valid: bool,
}

impl Sample {
    /// Blanking sample outside any frame.
    pub const IDLE: Sample = Sample {
        luma: 0,
        chroma: [0, 0],
        row_valid: false,
        frame_valid: false,
    };

    /// Active pixel with neutral chroma.
    pub fn active(luma: u8) -> Self {
        Sample {
            luma,
            chroma: [128, 128],
            row_valid: true,
            frame_valid: true,
        }
    }

    /// Active pixel carrying chroma.
    pub fn active_yuv(luma: u8, u: u8, v: u8) -> Self {
        Sample {
            luma,
            chroma: [u, v],
            row_valid: true,
            frame_valid: true,
        }
    }

    /// Horizontal blanking inside a frame.
    pub fn h_blank() -> Self {
        Sample {
            frame_valid: true,
            ..Sample::IDLE
        }
    }

    /// True when the sample carries a pixel.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.row_valid && self.frame_valid
    }
}

/// What the tracker learned from one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Strobe {
    /// Raster position of an active sample.
    pub position: Option<(usize, usize)>,
    /// frame_valid rose on this tick.
    pub frame_start: bool,
    /// frame_valid fell on this tick.
    pub frame_end: bool,
}

/// Recovers `(x, y)` from the validity markers.
///
/// After `resync` the tracker ignores everything until it has seen
/// frame_valid low, so the tail of an interrupted frame is never mistaken
/// for the start of a new one.
#[derive(Debug, Clone)]
pub struct RasterTracker {
    width: usize,
    height: usize,
    x: usize,
    y: usize,
    // Active samples since row_valid last rose, and the row that run began on.
    run: usize,
    run_y: usize,
    prev_active: bool,
    prev_frame_valid: bool,
    synced: bool,
}

impl RasterTracker {
    /// Tracker for a stream that starts outside any frame.
    pub fn new(width: usize, height: usize) -> Self {
        RasterTracker {
            width,
            height,
            x: 0,
            y: 0,
            run: 0,
            run_y: 0,
            prev_active: false,
            prev_frame_valid: false,
            synced: true,
        }
    }

    /// Forget any partially seen frame and wait for vertical blanking
    /// before accepting the next frame start.
    pub fn resync(&mut self) {
        *self = RasterTracker {
            synced: false,
            ..RasterTracker::new(self.width, self.height)
        };
    }

    /// False while waiting for vertical blanking after `resync`.
    pub fn is_synced(&self) -> bool {
        self.synced
    }

    /// Rows fully received in the current frame.
    pub fn rows_done(&self) -> usize {
        self.y
    }

    /// Consume one sample.
    pub fn advance(&mut self, sample: &Sample) -> Result<Strobe> {
        if !self.synced {
            self.synced = !sample.frame_valid;
            return Ok(Strobe::default());
        }

        let mut strobe = Strobe::default();
        let active = sample.is_active();

        if sample.frame_valid && !self.prev_frame_valid {
            strobe.frame_start = true;
            self.x = 0;
            self.y = 0;
        }

        // Active window closed mid-row: either too few samples, or a run
        // that wrapped past `width` without landing on a row boundary.
        if self.prev_active && !active && self.x != 0 {
            let (got, run_y) = (self.run, self.run_y);
            self.x = 0;
            self.run = 0;
            self.prev_active = false;
            if got > self.width {
                return Err(Error::LongRow {
                    y: run_y,
                    got,
                    expected: self.width,
                });
            }
            return Err(Error::ShortRow {
                y: run_y,
                got,
                expected: self.width,
            });
        }

        if active {
            if !self.prev_active {
                self.run = 0;
                self.run_y = self.y;
            }
            if self.y >= self.height {
                return Err(Error::RasterOverflow { x: self.x, y: self.y });
            }
            strobe.position = Some((self.x, self.y));
            self.run += 1;
            self.x += 1;
            if self.x == self.width {
                self.x = 0;
                self.y += 1;
            }
        }

        if !sample.frame_valid && self.prev_frame_valid {
            strobe.frame_end = true;
        }

        self.prev_active = active;
        self.prev_frame_valid = sample.frame_valid;
        Ok(strobe)
    }
}
