// pipeline.rs — Streaming equalizer: one sample in, one sample out per tick.
//
// Per tick, in order:
//
//   1. Raster tracker turns the validity markers into (x, y).
//   2. Tile locator maps (x, y) to tile + local offset.
//   3. Mapping stage looks the intensity up in the ready tables.
//   4. Accumulator adds the intensity to the live histogram.
//   5. Clip/CDF engine advances (only busy after a frame completes).
//   6. The output enters a fixed-length delay line; the oldest leaves.
//
// Frame N is therefore mapped with the tables of frame N-1, while frame N's
// statistics are gathered in the other generation. Until the first frame
// completes the ready tables are the identity.
//
// Lifecycle:
//
//   new/reset ──► Clearing (one tile per tick) ──► Running ──fatal──► Halted
//                        ▲                                              │
//                        └────────────────── reset() ◄──────────────────┘
//
// Active samples during Clearing are rejected with `NotReady`. After a
// reset the rest of an interrupted frame passes through unmapped and
// uncounted; tracking resumes at the next frame start after vertical
// blanking. A fatal timing error moves to Halted; every later tick fails
// until `reset()`.

use std::collections::VecDeque;

use log::{debug, info, warn};

use crate::buffers::{BufferManager, Histogram, Lut};
use crate::cdf::{ClipCdfEngine, EngineState};
use crate::config::{ClaheConfig, Controls};
use crate::error::{Error, Result};
use crate::histogram::{Accumulator, HazardStats, Outcome};
use crate::mapping::MappingStage;
use crate::sample::{RasterTracker, Sample};
use crate::tile::TileGrid;

/// Ticks between a sample entering and its result leaving: tile lookup,
/// table read, horizontal blend, vertical blend.
pub const PIPELINE_LATENCY: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Clearing { next: usize },
    Running,
    Halted,
}

/// Counters for monitoring and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub ticks: u64,
    pub active_samples: u64,
    pub frames_completed: u64,
    pub hazards: HazardStats,
}

/// The streaming contrast-limited adaptive equalizer.
pub struct ClahePipeline {
    config: ClaheConfig,
    grid: TileGrid,
    tracker: RasterTracker,
    accumulator: Accumulator,
    engine: ClipCdfEngine,
    buffers: BufferManager,
    mapping: MappingStage,
    controls: Controls,
    pending_controls: Option<Controls>,
    delay: VecDeque<Sample>,
    phase: Phase,
    in_frame: bool,
    frame_complete_seen: bool,
    ticks: u64,
    active_samples: u64,
    frames_completed: u64,
}

impl ClahePipeline {
    /// Build a pipeline. It starts in the clearing sweep; see `is_ready`.
    pub fn new(config: ClaheConfig) -> Result<Self> {
        config.validate()?;
        let grid = TileGrid::new(config.width, config.height, config.tile_cols, config.tile_rows);
        let mut pipeline = ClahePipeline {
            tracker: RasterTracker::new(config.width, config.height),
            accumulator: Accumulator::new(&grid, config.accumulator_latency),
            engine: ClipCdfEngine::new(&grid),
            buffers: BufferManager::new(grid.tile_count()),
            mapping: MappingStage::new(grid.clone()),
            controls: config.controls(),
            pending_controls: None,
            delay: VecDeque::with_capacity(PIPELINE_LATENCY + 1),
            phase: Phase::Clearing { next: 0 },
            in_frame: false,
            frame_complete_seen: false,
            ticks: 0,
            active_samples: 0,
            frames_completed: 0,
            grid,
            config,
        };
        pipeline.reset();
        Ok(pipeline)
    }

    /// Replace the configuration. Always resets.
    pub fn reconfigure(&mut self, config: ClaheConfig) -> Result<()> {
        *self = ClahePipeline::new(config)?;
        Ok(())
    }

    /// Abort everything in flight and start the clearing sweep.
    pub fn reset(&mut self) {
        if self.accumulator.has_partial_frame() {
            warn!(
                "reset discarded a partial frame after {} rows",
                self.tracker.rows_done()
            );
        }
        self.tracker.resync();
        self.accumulator.reset();
        self.engine.reset();
        self.controls = self.pending_controls.take().unwrap_or(self.controls);
        self.delay.clear();
        self.delay.extend(std::iter::repeat(Sample::IDLE).take(PIPELINE_LATENCY));
        self.phase = Phase::Clearing { next: 0 };
        self.in_frame = false;
        self.frame_complete_seen = false;
        info!(
            "reset: {}x{} frame, {}x{} tiles, clip threshold {}",
            self.config.width,
            self.config.height,
            self.grid.cols(),
            self.grid.rows(),
            self.controls.clip_threshold
        );
    }

    // --- Introspection ---

    pub fn config(&self) -> &ClaheConfig {
        &self.config
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    /// Settings in effect for the current frame.
    pub fn controls(&self) -> Controls {
        self.controls
    }

    /// True once the clearing sweep is over and samples are accepted.
    pub fn is_ready(&self) -> bool {
        self.phase == Phase::Running
    }

    pub fn is_halted(&self) -> bool {
        self.phase == Phase::Halted
    }

    /// Idle ticks still needed before `is_ready`.
    pub fn ticks_until_ready(&self) -> usize {
        match self.phase {
            Phase::Clearing { next } => self.grid.tile_count() - next,
            _ => 0,
        }
    }

    pub fn engine_state(&self) -> EngineState {
        self.engine.state()
    }

    pub fn frames_completed(&self) -> u64 {
        self.frames_completed
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            ticks: self.ticks,
            active_samples: self.active_samples,
            frames_completed: self.frames_completed,
            hazards: self.accumulator.stats(),
        }
    }

    /// Mapping table the output stage currently uses for `tile`.
    pub fn ready_lut(&self, tile: usize) -> &Lut {
        self.buffers.ready_lut(tile)
    }

    /// Histogram behind the ready table of `tile` (the last completed frame).
    pub fn ready_histogram(&self, tile: usize) -> &Histogram {
        let ready = self.buffers.live_generation(tile) ^ 1;
        self.buffers.histogram(tile, ready)
    }

    /// Pixels of the current frame counted so far for `tile`.
    pub fn live_count(&self, tile: usize) -> u32 {
        self.accumulator.count(tile)
    }

    // --- Control ---

    /// Request new runtime settings. Applied immediately between frames,
    /// otherwise deferred to the next frame boundary.
    pub fn set_controls(&mut self, controls: Controls) {
        if self.in_frame {
            debug!("controls deferred to frame boundary: {controls:?}");
            self.pending_controls = Some(controls);
        } else {
            self.apply_controls(controls);
        }
    }

    fn apply_controls(&mut self, controls: Controls) {
        if controls != self.controls {
            info!("controls applied: {controls:?}");
        }
        self.controls = controls;
    }

    // --- Stream ---

    /// Advance one tick.
    pub fn tick(&mut self, input: Sample) -> Result<Sample> {
        match self.phase {
            Phase::Halted => Err(Error::Halted),
            Phase::Clearing { next } => {
                let remaining = self.grid.tile_count() - next;
                // The tracker stays out of sync until vertical blanking.
                if input.frame_valid {
                    self.tracker.resync();
                } else {
                    self.tracker.advance(&input)?;
                }
                if input.is_active() {
                    return Err(Error::NotReady { remaining });
                }
                self.buffers.clear_tile(next);
                self.phase = if next + 1 == self.grid.tile_count() {
                    debug!("reset sweep finished after {} tiles", next + 1);
                    Phase::Running
                } else {
                    Phase::Clearing { next: next + 1 }
                };
                self.ticks += 1;
                Ok(self.delay_line(input))
            }
            Phase::Running => self.run_tick(input).map_err(|err| {
                if err.is_fatal() {
                    warn!("pipeline halted: {err}");
                    self.phase = Phase::Halted;
                }
                err
            }),
        }
    }

    /// Feed a batch of samples, collecting the outputs.
    pub fn process(&mut self, input: &[Sample]) -> Result<Vec<Sample>> {
        input.iter().map(|&s| self.tick(s)).collect()
    }

    /// Feed idle ticks until the clearing sweep is over.
    pub fn settle(&mut self) -> Result<()> {
        while !self.is_ready() {
            self.tick(Sample::IDLE)?;
        }
        Ok(())
    }

    fn run_tick(&mut self, input: Sample) -> Result<Sample> {
        self.ticks += 1;
        let strobe = self.tracker.advance(&input)?;

        if strobe.frame_start {
            // Blending reads neighbouring tiles, so every table must have
            // flipped before any pixel of the new frame is mapped.
            if let Some(tile) = self.buffers.first_pending() {
                return Err(Error::FrameOverrun { tile });
            }
            self.in_frame = true;
            self.frame_complete_seen = false;
        }

        let mut output = input;
        let mut acc_input = None;
        if let Some((x, y)) = strobe.position {
            let coord = self.grid.locate(x, y);
            output.luma = self.mapping.map(&self.buffers, &coord, input.luma, &self.controls);
            acc_input = Some((coord.index, input.luma));
            self.active_samples += 1;
        }

        if self.accumulator.step(&mut self.buffers, acc_input)? == Outcome::FrameComplete {
            self.frames_completed += 1;
            self.frame_complete_seen = true;
            debug!("frame {} histograms complete", self.frames_completed);
            self.engine.start(self.controls.clip_threshold);
        }

        if strobe.frame_end {
            if !self.frame_complete_seen {
                if let Some(err) = self.accumulator.incomplete_error() {
                    return Err(err);
                }
            }
            self.in_frame = false;
            if let Some(controls) = self.pending_controls.take() {
                self.apply_controls(controls);
            }
        }

        if self.engine.run(&mut self.buffers, self.config.cdf_steps_per_tick)? {
            debug!("frame {} mapping tables live", self.frames_completed);
        }

        Ok(self.delay_line(output))
    }

    fn delay_line(&mut self, sample: Sample) -> Sample {
        self.delay.push_back(sample);
        self.delay.pop_front().unwrap_or(Sample::IDLE)
    }
}
