//! Steadyframe Processing Core
//!
//! Turns a stream of frames into per-frame corrections:
//! - **Motion Sampler:** accumulate frame-to-frame motion into a trajectory
//! - **Trajectory Stabilizer:** derive a target path per mode and the corrections toward it
//! - **Crop Synthesizer:** one global zoom that hides the borders the corrections expose
//!
//! This crate is pure computation. Frames come in as `image` buffers;
//! decoding, encoding, and warping live in the render engine.

pub mod crop;
pub mod motion;
#[cfg(feature = "opencv")]
pub mod optical_flow;
pub mod sampler;
pub mod smoothing;
pub mod stabilizer;

pub use crop::{compute_crop, resolve_crop, BorderExposure};
pub use motion::{BlockMatchConfig, BlockMatchEstimator, FeatureRegion, MotionEstimator};
#[cfg(feature = "opencv")]
pub use optical_flow::{OpticalFlowConfig, OpticalFlowEstimator};
pub use sampler::{MotionSampler, SamplingOutcome};
pub use stabilizer::Stabilizer;
