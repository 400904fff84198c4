// raster.rs — Frame-level driver around the streaming pipeline.
//
// Turns whole frames into a timed sample stream (active pixels, horizontal
// blanking after every row, vertical blanking after every frame), pushes
// it through `ClahePipeline`, and reassembles the output stream into
// frames again.
//
//   row 0:  [w active][h_blank]
//   row 1:  [w active][h_blank]
//   ...
//   frame:  [v_blank idle]
//
// The clip/CDF engine runs during blanking; with
// `cdf_steps_per_tick > 0` the vertical blanking must be long enough for
// the engine to finish before the next frame arrives.

use crate::error::{Error, Result};
use crate::image::YuvFrame;
use crate::pipeline::{ClahePipeline, PIPELINE_LATENCY};
use crate::sample::Sample;

/// Blanking lengths in ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterTiming {
    /// Idle ticks after each row (frame_valid high).
    pub h_blank: usize,
    /// Idle ticks after each frame (frame_valid low). Must be at least 1.
    pub v_blank: usize,
}

impl Default for RasterTiming {
    fn default() -> Self {
        RasterTiming {
            h_blank: 16,
            v_blank: 64,
        }
    }
}

/// Iterator over the samples of one frame, blanking included.
pub struct RasterScan<'a> {
    frame: &'a YuvFrame,
    timing: RasterTiming,
    index: usize,
    total: usize,
}

impl<'a> RasterScan<'a> {
    pub fn new(frame: &'a YuvFrame, timing: RasterTiming) -> Self {
        let row_len = frame.width() + timing.h_blank;
        RasterScan {
            frame,
            timing,
            index: 0,
            total: frame.height() * row_len + timing.v_blank,
        }
    }
}

impl Iterator for RasterScan<'_> {
    type Item = Sample;

    fn next(&mut self) -> Option<Sample> {
        if self.index >= self.total {
            return None;
        }
        let i = self.index;
        self.index += 1;

        let width = self.frame.width();
        let row_len = width + self.timing.h_blank;
        if i >= self.frame.height() * row_len {
            return Some(Sample::IDLE);
        }
        let (x, y) = (i % row_len, i / row_len);
        if x >= width {
            return Some(Sample::h_blank());
        }
        Some(Sample::active_yuv(
            self.frame.y.get(x, y),
            self.frame.u.get(x, y),
            self.frame.v.get(x, y),
        ))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.total - self.index;
        (left, Some(left))
    }
}

impl ExactSizeIterator for RasterScan<'_> {}

/// Reassembles active output samples into frames.
pub struct FrameCollector {
    width: usize,
    height: usize,
    current: YuvFrame,
    x: usize,
    y: usize,
}

impl FrameCollector {
    pub fn new(width: usize, height: usize) -> Self {
        FrameCollector {
            width,
            height,
            current: blank_frame(width, height),
            x: 0,
            y: 0,
        }
    }

    /// Take one output sample; returns a frame when its last pixel arrives.
    pub fn push(&mut self, sample: &Sample) -> Option<YuvFrame> {
        if !sample.is_active() {
            return None;
        }
        self.current.y.set(self.x, self.y, sample.luma);
        self.current.u.set(self.x, self.y, sample.chroma[0]);
        self.current.v.set(self.x, self.y, sample.chroma[1]);
        self.x += 1;
        if self.x < self.width {
            return None;
        }
        self.x = 0;
        self.y += 1;
        if self.y < self.height {
            return None;
        }
        self.y = 0;
        Some(std::mem::replace(
            &mut self.current,
            blank_frame(self.width, self.height),
        ))
    }
}

fn blank_frame(width: usize, height: usize) -> YuvFrame {
    YuvFrame::from_luma(crate::image::Image::new(width, height))
}

/// Stream `frames` through `pipeline` back to back and return the
/// enhanced frames. Frame N is mapped with the tables of frame N-1.
pub fn process_frames(
    pipeline: &mut ClahePipeline,
    frames: &[YuvFrame],
    timing: RasterTiming,
) -> Result<Vec<YuvFrame>> {
    if timing.v_blank == 0 {
        return Err(Error::InvalidConfig("v_blank must be at least one tick".into()));
    }
    let (want_w, want_h) = (pipeline.config().width, pipeline.config().height);
    if let Some(f) = frames.iter().find(|f| f.width() != want_w || f.height() != want_h) {
        return Err(Error::DimensionMismatch {
            got_w: f.width(),
            got_h: f.height(),
            want_w,
            want_h,
        });
    }

    pipeline.settle()?;
    let mut collector = FrameCollector::new(want_w, want_h);
    let mut out = Vec::with_capacity(frames.len());
    for frame in frames {
        for sample in RasterScan::new(frame, timing) {
            if let Some(done) = collector.push(&pipeline.tick(sample)?) {
                out.push(done);
            }
        }
    }
    // Drain the delay line.
    for _ in 0..PIPELINE_LATENCY {
        if let Some(done) = collector.push(&pipeline.tick(Sample::IDLE)?) {
            out.push(done);
        }
    }
    Ok(out)
}
