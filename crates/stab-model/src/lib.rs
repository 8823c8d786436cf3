//! Steadyframe Model
//!
//! Defines the core data contracts of the stabilization pipeline:
//! - **Trajectory:** cumulative per-frame camera motion (x, y, angle)
//! - **Modes:** the fixed table of per-axis stabilization policies
//! - **Corrections:** per-frame counter-transforms and their affine matrices
//! - **Geometry:** frame dimensions and fixed decode-time rotation
//! - **Settings:** validated run parameters
//!
//! Translations are in pixels, angles in radians.

pub mod correction;
pub mod geometry;
pub mod mode;
pub mod settings;
pub mod trajectory;

pub use correction::*;
pub use geometry::*;
pub use mode::*;
pub use settings::*;
pub use trajectory::*;
