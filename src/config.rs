// config.rs — Pipeline configuration.
//
// Two levels of configuration:
//
//   ClaheConfig: geometry and initial settings. Fixed for the lifetime of a
//                pipeline instance; changing the grid means a reset.
//   Controls:    the knobs that may change between frames (clip
//                threshold, equalization on/off, interpolation on/off).
//                Requests made mid-frame are deferred to the next frame
//                boundary by the pipeline.
//
// 16-tile and 64-tile instances differ only in grid size; both are presets
// of the same struct.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Largest supported accumulator read→write distance.
pub const MAX_ACCUMULATOR_LATENCY: usize = 8;

/// Geometry and initial settings of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaheConfig {
    /// Active frame width in pixels.
    pub width: usize,
    /// Active frame height in pixels.
    pub height: usize,
    /// Number of tile columns.
    pub tile_cols: usize,
    /// Number of tile rows.
    pub tile_rows: usize,
    /// Clip limit multiplier on the uniform bin count
    /// (`clip_limit = floor(tile_pixels / 256) * clip_threshold`).
    pub clip_threshold: u32,
    /// When false, samples pass through untouched (still delayed).
    pub equalization_enabled: bool,
    /// When false, each sample maps through its own tile only.
    pub interpolation_enabled: bool,
    /// Ticks between a histogram bin read and its write-back.
    pub accumulator_latency: usize,
    /// Clip/CDF engine state transitions per tick. 0 = run to completion
    /// in the tick the frame finishes.
    pub cdf_steps_per_tick: usize,
}

impl Default for ClaheConfig {
    fn default() -> Self {
        Self::grid_4x4_720p()
    }
}

impl ClaheConfig {
    /// 1280×720 frame, 4×4 tiles of 320×180.
    pub fn grid_4x4_720p() -> Self {
        ClaheConfig {
            width: 1280,
            height: 720,
            tile_cols: 4,
            tile_rows: 4,
            clip_threshold: 3,
            equalization_enabled: true,
            interpolation_enabled: true,
            accumulator_latency: 3,
            cdf_steps_per_tick: 0,
        }
    }

    /// 1280×720 frame, 8×8 tiles of 160×90.
    pub fn grid_8x8_720p() -> Self {
        ClaheConfig {
            tile_cols: 8,
            tile_rows: 8,
            ..Self::grid_4x4_720p()
        }
    }

    /// Arbitrary frame size with the default settings.
    pub fn with_size(width: usize, height: usize, tile_cols: usize, tile_rows: usize) -> Self {
        ClaheConfig {
            width,
            height,
            tile_cols,
            tile_rows,
            ..Self::grid_4x4_720p()
        }
    }

    /// Parse a YAML document. Missing keys take their defaults.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: ClaheConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| Error::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Serialize to YAML.
    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Check that the geometry yields a non-empty tile everywhere.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidConfig(format!(
                "frame size {}x{} must be non-zero",
                self.width, self.height
            )));
        }
        if self.tile_cols == 0 || self.tile_rows == 0 {
            return Err(Error::InvalidConfig(format!(
                "tile grid {}x{} must be non-zero",
                self.tile_cols, self.tile_rows
            )));
        }
        check_axis("width", self.width, self.tile_cols)?;
        check_axis("height", self.height, self.tile_rows)?;
        if self.accumulator_latency == 0 || self.accumulator_latency > MAX_ACCUMULATOR_LATENCY {
            return Err(Error::InvalidConfig(format!(
                "accumulator_latency {} outside 1..={MAX_ACCUMULATOR_LATENCY}",
                self.accumulator_latency
            )));
        }
        Ok(())
    }

    /// The runtime-adjustable subset of this config.
    pub fn controls(&self) -> Controls {
        Controls {
            clip_threshold: self.clip_threshold,
            equalization_enabled: self.equalization_enabled,
            interpolation_enabled: self.interpolation_enabled,
        }
    }
}

// With nominal tile size ceil(len / count), the last tile starts at
// (count - 1) * size and must still contain at least one pixel.
fn check_axis(name: &str, len: usize, count: usize) -> Result<()> {
    if count > len {
        return Err(Error::InvalidConfig(format!(
            "{count} tiles do not fit in {name} {len}"
        )));
    }
    let size = len.div_ceil(count);
    if (count - 1) * size >= len {
        return Err(Error::InvalidConfig(format!(
            "{name} {len} split into {count} tiles of {size} leaves the last tile empty"
        )));
    }
    Ok(())
}

/// Settings that may change between frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Controls {
    /// Clip limit multiplier.
    pub clip_threshold: u32,
    /// Equalization on/off.
    pub equalization_enabled: bool,
    /// Bilinear blending on/off.
    pub interpolation_enabled: bool,
}

impl Default for Controls {
    fn default() -> Self {
        ClaheConfig::default().controls()
    }
}
