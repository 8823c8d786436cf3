//! Cumulative camera trajectory and the motion samples that build it.

use serde::{Deserialize, Serialize};
use steadyframe_common::error::{StabError, StabResult};

/// Incremental motion from one frame to the next.
///
/// `dx`/`dy` are pixels, `dangle` is radians.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MotionSample {
    pub dx: f64,
    pub dy: f64,
    pub dangle: f64,
}

impl MotionSample {
    /// No detected motion.
    pub const ZERO: MotionSample = MotionSample {
        dx: 0.0,
        dy: 0.0,
        dangle: 0.0,
    };

    pub fn new(dx: f64, dy: f64, dangle: f64) -> Self {
        Self { dx, dy, dangle }
    }

    /// Extract translation and rotation from a 2x3 similarity matrix
    /// `[[a, -b, tx], [b, a, ty]]`.
    pub fn from_matrix(m: &[[f64; 3]; 2]) -> Self {
        Self {
            dx: m[0][2],
            dy: m[1][2],
            dangle: m[1][0].atan2(m[0][0]),
        }
    }

    /// Whether every component is finite.
    pub fn is_finite(&self) -> bool {
        self.dx.is_finite() && self.dy.is_finite() && self.dangle.is_finite()
    }
}

/// Cumulative motion per axis, one entry per frame.
///
/// Index 0 is the reference frame and is always `(0, 0, 0)` when built
/// through [`Trajectory::push_sample`]. All three axes have the same length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub angle: Vec<f64>,
}

impl Trajectory {
    /// An empty trajectory (zero frames read).
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(frames: usize) -> Self {
        Self {
            x: Vec::with_capacity(frames),
            y: Vec::with_capacity(frames),
            angle: Vec::with_capacity(frames),
        }
    }

    /// Build from three axis vectors, rejecting mismatched lengths.
    pub fn from_axes(x: Vec<f64>, y: Vec<f64>, angle: Vec<f64>) -> StabResult<Self> {
        let trajectory = Self { x, y, angle };
        trajectory.validate()?;
        Ok(trajectory)
    }

    /// Build by accumulating samples after the zero reference frame.
    pub fn from_samples(samples: &[MotionSample]) -> Self {
        let mut trajectory = Self::with_capacity(samples.len() + 1);
        trajectory.push_reference();
        for sample in samples {
            trajectory.push_sample(*sample);
        }
        trajectory
    }

    /// Seed the reference frame. Only meaningful on an empty trajectory.
    pub fn push_reference(&mut self) {
        self.x.push(0.0);
        self.y.push(0.0);
        self.angle.push(0.0);
    }

    /// Append the next frame: previous cumulative value plus the sample.
    ///
    /// On an empty trajectory the reference frame is seeded first.
    pub fn push_sample(&mut self, sample: MotionSample) {
        if self.is_empty() {
            self.push_reference();
        }
        let x = self.x.last().copied().unwrap_or(0.0) + sample.dx;
        let y = self.y.last().copied().unwrap_or(0.0) + sample.dy;
        let a = self.angle.last().copied().unwrap_or(0.0) + sample.dangle;
        self.x.push(x);
        self.y.push(y);
        self.angle.push(a);
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Check that all three axes have equal length.
    pub fn validate(&self) -> StabResult<()> {
        check_axis_lengths("trajectory", self.x.len(), self.y.len(), self.angle.len())
    }

    /// `(x, y, angle)` at a frame.
    pub fn get(&self, index: usize) -> Option<(f64, f64, f64)> {
        Some((
            *self.x.get(index)?,
            *self.y.get(index)?,
            *self.angle.get(index)?,
        ))
    }
}

/// Shared length check for the parallel-axis sequences.
pub fn check_axis_lengths(what: &str, x: usize, y: usize, angle: usize) -> StabResult<()> {
    if x != y || x != angle {
        return Err(StabError::invariant(format!(
            "{what} axis lengths differ: x={x}, y={y}, angle={angle}"
        )));
    }
    Ok(())
}
