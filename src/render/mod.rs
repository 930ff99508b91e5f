//! Rendering: canvas backends, frame composition and scheduling

pub mod canvas;
pub mod recorder;
pub mod raster;
pub mod lod;
pub mod pipeline;
pub mod profiler;
pub mod scheduler;

pub use canvas::{Canvas, FillRule, Path, Stroke};
pub use pipeline::{FrameStats, RenderOptions, RenderPipeline};
pub use profiler::{PassProfiler, PassTimings};
pub use raster::RasterCanvas;
pub use recorder::{DrawCall, RecordingCanvas};
pub use scheduler::{FrameScheduler, SchedulerStats};
