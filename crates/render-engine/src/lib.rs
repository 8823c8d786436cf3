//! Steadyframe Render Engine
//!
//! Frame I/O and the two-pass stabilization pipeline.
//!
//! # Pipeline Architecture
//!
//! ```text
//! source ──► grayscale ──► Motion Sampler ──► trajectory
//!                                                 │
//!                                     Trajectory Stabilizer (mode, window)
//!                                                 │
//!                                            corrections ──► Crop Synthesizer
//!                                                 │                 │
//! source (rewound) ──────────────────────► Frame Renderer ◄── crop factor
//!                                                 │
//!                                      warp (correction) + zoom
//!                                                 ▼
//!                                               sink
//! ```
//!
//! Sources and sinks are traits; ffmpeg processes, image directories, and
//! in-memory vectors implement them.

pub mod ffmpeg;
pub mod image_seq;
pub mod media;
pub mod memory;
pub mod pipeline;
pub mod renderer;
pub mod report;
pub mod warp;

pub use ffmpeg::{command_exists, EncodeOptions, FfmpegSink, FfmpegSource, OutputCodec};
pub use image_seq::{ImageSequenceSink, ImageSequenceSource};
pub use media::{FrameSink, FrameSource, VideoInfo};
pub use memory::{VecSink, VecSource};
pub use pipeline::{
    Analysis, Pipeline, PipelineProgress, PipelineStage, ProgressCallback, StabilizeSummary,
};
pub use renderer::FrameRenderer;
pub use report::{default_report_path, RunReport};
pub use warp::{ImageprocResampler, Resampler};
