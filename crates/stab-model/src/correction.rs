//! Per-frame correction deltas and the affine transforms built from them.

use serde::{Deserialize, Serialize};
use steadyframe_common::error::StabResult;

use crate::geometry::FrameSize;
use crate::trajectory::check_axis_lengths;

/// Counter-transform for one frame: target minus raw trajectory value.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CorrectionDelta {
    pub tx: f64,
    pub ty: f64,
    pub ta: f64,
}

impl CorrectionDelta {
    pub fn new(tx: f64, ty: f64, ta: f64) -> Self {
        Self { tx, ty, ta }
    }

    /// Rotation by `ta` followed by translation by `(tx, ty)`.
    pub fn to_affine(&self) -> AffineTransform {
        let (sin, cos) = self.ta.sin_cos();
        AffineTransform {
            m: [[cos, -sin, self.tx], [sin, cos, self.ty]],
        }
    }
}

/// Correction deltas for a whole sequence, stored per axis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Corrections {
    pub tx: Vec<f64>,
    pub ty: Vec<f64>,
    pub ta: Vec<f64>,
}

impl Corrections {
    /// Build from three axis vectors, rejecting mismatched lengths.
    pub fn from_axes(tx: Vec<f64>, ty: Vec<f64>, ta: Vec<f64>) -> StabResult<Self> {
        let corrections = Self { tx, ty, ta };
        corrections.validate()?;
        Ok(corrections)
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    pub fn validate(&self) -> StabResult<()> {
        check_axis_lengths("correction", self.tx.len(), self.ty.len(), self.ta.len())
    }

    pub fn get(&self, index: usize) -> Option<CorrectionDelta> {
        Some(CorrectionDelta {
            tx: *self.tx.get(index)?,
            ty: *self.ty.get(index)?,
            ta: *self.ta.get(index)?,
        })
    }

    /// Deltas in frame order. Stops at the shortest axis.
    pub fn iter(&self) -> impl Iterator<Item = CorrectionDelta> + '_ {
        self.tx
            .iter()
            .zip(&self.ty)
            .zip(&self.ta)
            .map(|((&tx, &ty), &ta)| CorrectionDelta { tx, ty, ta })
    }

    /// Every delta multiplied by `k`.
    pub fn scaled(&self, k: f64) -> Corrections {
        Corrections {
            tx: self.tx.iter().map(|v| v * k).collect(),
            ty: self.ty.iter().map(|v| v * k).collect(),
            ta: self.ta.iter().map(|v| v * k).collect(),
        }
    }
}

/// A 2x3 affine matrix mapping source pixel coordinates to output coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineTransform {
    pub m: [[f64; 3]; 2],
}

impl AffineTransform {
    pub const IDENTITY: AffineTransform = AffineTransform {
        m: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
    };

    /// Uniform scale about the frame center.
    ///
    /// Matches a rotation matrix about the center with angle 0:
    /// `[[s, 0, (1 - s) cx], [0, s, (1 - s) cy]]`.
    pub fn scale_about_center(scale: f64, size: FrameSize) -> AffineTransform {
        let (cx, cy) = size.center();
        AffineTransform {
            m: [
                [scale, 0.0, (1.0 - scale) * cx],
                [0.0, scale, (1.0 - scale) * cy],
            ],
        }
    }

    /// Map a point.
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let m = &self.m;
        (
            m[0][0] * x + m[0][1] * y + m[0][2],
            m[1][0] * x + m[1][1] * y + m[1][2],
        )
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Row-major 3x3 homogeneous matrix in single precision.
    pub fn to_homogeneous_f32(&self) -> [f32; 9] {
        let m = &self.m;
        [
            m[0][0] as f32,
            m[0][1] as f32,
            m[0][2] as f32,
            m[1][0] as f32,
            m[1][1] as f32,
            m[1][2] as f32,
            0.0,
            0.0,
            1.0,
        ]
    }
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}
