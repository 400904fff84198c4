// clahe_stream: streaming tile-based contrast-limited adaptive histogram
// equalization for raster video, one sample per tick
//
// Reference: Zuiderveld, "Contrast Limited Adaptive Histogram Equalization",
// Graphics Gems IV (1994)

pub mod error;
pub mod config;
pub mod image;
pub mod sample;
pub mod tile;
pub mod buffers;
pub mod histogram;
pub mod cdf;
pub mod mapping;
pub mod pipeline;
pub mod raster;
pub mod reference;

pub use config::{ClaheConfig, Controls};
pub use error::{Error, Result};
pub use image::{Image, YuvFrame};
pub use pipeline::{ClahePipeline, PipelineStats, PIPELINE_LATENCY};
pub use raster::{process_frames, RasterTiming};
pub use sample::Sample;
