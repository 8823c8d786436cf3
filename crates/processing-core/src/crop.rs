//! Crop synthesizer.
//!
//! Computes a single zoom factor for the whole output that covers the worst
//! border exposure of any frame. One uniform zoom avoids visible pulsing.

use steadyframe_common::error::StabResult;
use steadyframe_model::{CorrectionDelta, Corrections, CropSetting, FrameSize, MAX_CROP_PERCENT};

/// Safety slack added to the crop, in percentage points.
pub const CROP_MARGIN_PERCENT: f64 = 0.2;

/// Pixels of uncovered canvas on each side of a corrected frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BorderExposure {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

impl BorderExposure {
    /// Exposure left by one correction on a frame of height `height`.
    ///
    /// Rotation about the center is approximated as a vertical shift of
    /// `|height * sin(ta)|`, applied to top and bottom alike.
    pub fn of(delta: &CorrectionDelta, height: f64) -> Self {
        let rotation = (height * delta.ta.sin()).abs();
        Self {
            left: delta.tx.max(0.0),
            right: (-delta.tx).max(0.0),
            top: delta.ty.max(0.0) + rotation,
            bottom: (-delta.ty).max(0.0) + rotation,
        }
    }

    /// Side-wise maximum of two exposures.
    pub fn max(self, other: BorderExposure) -> Self {
        Self {
            left: self.left.max(other.left),
            right: self.right.max(other.right),
            top: self.top.max(other.top),
            bottom: self.bottom.max(other.bottom),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.left <= 0.0 && self.right <= 0.0 && self.top <= 0.0 && self.bottom <= 0.0
    }

    /// Crop needed to hide this exposure, as a fraction in `[0, 0.40]`.
    pub fn crop_factor(&self, size: FrameSize) -> f64 {
        if self.is_zero() {
            return 0.0;
        }
        let crop_w = 2.0 * self.left.max(self.right);
        let crop_h = 2.0 * self.top.max(self.bottom);
        let percent_w = crop_w * 100.0 / size.width as f64 + CROP_MARGIN_PERCENT;
        let percent_h = crop_h * 100.0 / size.height as f64 + CROP_MARGIN_PERCENT;
        percent_w.max(percent_h).min(MAX_CROP_PERCENT) / 100.0
    }
}

/// Worst exposure over every frame.
pub fn max_exposure(corrections: &Corrections, size: FrameSize) -> StabResult<BorderExposure> {
    corrections.validate()?;
    let height = size.height as f64;
    Ok(corrections
        .iter()
        .map(|delta| BorderExposure::of(&delta, height))
        .fold(BorderExposure::default(), BorderExposure::max))
}

/// Global crop factor in `[0, 0.40]` for a correction sequence.
///
/// An empty sequence, or one that exposes no border, needs no crop.
pub fn compute_crop(corrections: &Corrections, size: FrameSize) -> StabResult<f64> {
    corrections.validate()?;
    if corrections.is_empty() {
        return Ok(0.0);
    }
    size.validate()?;
    let exposure = max_exposure(corrections, size)?;
    let crop = exposure.crop_factor(size);

    tracing::debug!(
        left = exposure.left,
        right = exposure.right,
        top = exposure.top,
        bottom = exposure.bottom,
        crop,
        "Synthesized crop factor"
    );
    Ok(crop)
}

/// Crop factor for a run: synthesized for `Auto`, taken as-is for `Fixed`.
pub fn resolve_crop(
    setting: CropSetting,
    corrections: &Corrections,
    size: FrameSize,
) -> StabResult<f64> {
    match setting {
        CropSetting::Auto => compute_crop(corrections, size),
        CropSetting::Fixed(percent) => {
            corrections.validate()?;
            Ok(percent.clamp(0.0, MAX_CROP_PERCENT) / 100.0)
        }
    }
}
