//! Validated run settings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use steadyframe_common::config::StabilizationDefaults;
use steadyframe_common::error::{StabError, StabResult};

use crate::mode::StabilizationMode;

/// Smoothing window bounds, in whole seconds.
pub const MIN_WINDOW_SECS: u32 = 1;
pub const MAX_WINDOW_SECS: u32 = 4;

/// Upper bound for the crop, in percent of the frame.
pub const MAX_CROP_PERCENT: f64 = 40.0;

/// How the global crop factor is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "percent")]
pub enum CropSetting {
    /// Derive the crop from the worst per-frame exposure.
    #[default]
    Auto,
    /// Fixed crop in percent of the frame, `0..=40`.
    Fixed(f64),
}

impl FromStr for CropSetting {
    type Err = StabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("auto") {
            return Ok(CropSetting::Auto);
        }
        let number = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();
        let percent: f64 = number.parse().map_err(|_| {
            StabError::config(format!("invalid crop `{s}`: expected `auto` or a percentage"))
        })?;
        Ok(CropSetting::Fixed(percent))
    }
}

impl fmt::Display for CropSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CropSetting::Auto => f.write_str("auto"),
            CropSetting::Fixed(percent) => write!(f, "{percent}%"),
        }
    }
}

/// What the sampler records when the motion estimator has no confident answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissingMotionPolicy {
    /// Treat the frame pair as motionless.
    #[default]
    Zero,
    /// Reuse the last confident sample.
    HoldLast,
}

impl FromStr for MissingMotionPolicy {
    type Err = StabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zero" => Ok(MissingMotionPolicy::Zero),
            "hold-last" | "hold_last" => Ok(MissingMotionPolicy::HoldLast),
            other => Err(StabError::config(format!(
                "invalid missing-motion policy `{other}`: expected `zero` or `hold-last`"
            ))),
        }
    }
}

impl fmt::Display for MissingMotionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingMotionPolicy::Zero => f.write_str("zero"),
            MissingMotionPolicy::HoldLast => f.write_str("hold-last"),
        }
    }
}

/// Parameters of one stabilization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilizeSettings {
    pub mode: StabilizationMode,

    /// Smoothing window in seconds, converted to frames with the source fps.
    pub window_secs: u32,

    /// Output frame rate. `None` keeps the source rate.
    pub output_fps: Option<f64>,

    pub crop: CropSetting,

    pub missing_motion: MissingMotionPolicy,
}

impl Default for StabilizeSettings {
    fn default() -> Self {
        Self {
            mode: StabilizationMode::Generic,
            window_secs: 2,
            output_fps: None,
            crop: CropSetting::Auto,
            missing_motion: MissingMotionPolicy::Zero,
        }
    }
}

impl StabilizeSettings {
    pub fn validate(&self) -> StabResult<()> {
        if !(MIN_WINDOW_SECS..=MAX_WINDOW_SECS).contains(&self.window_secs) {
            return Err(StabError::config(format!(
                "window must be between {MIN_WINDOW_SECS} and {MAX_WINDOW_SECS} seconds, got {}",
                self.window_secs
            )));
        }
        if let Some(fps) = self.output_fps {
            if !fps.is_finite() || fps <= 0.0 {
                return Err(StabError::config(format!(
                    "output fps must be positive, got {fps}"
                )));
            }
        }
        if let CropSetting::Fixed(percent) = self.crop {
            if !(0.0..=MAX_CROP_PERCENT).contains(&percent) {
                return Err(StabError::config(format!(
                    "fixed crop must be between 0 and {MAX_CROP_PERCENT} percent, got {percent}"
                )));
            }
        }
        Ok(())
    }

    /// Smoothing window in frames for a source running at `source_fps`.
    pub fn window_frames(&self, source_fps: f64) -> usize {
        if !source_fps.is_finite() || source_fps <= 0.0 {
            return 0;
        }
        (source_fps * self.window_secs as f64) as usize
    }

    /// Frame rate to encode the output with.
    pub fn effective_output_fps(&self, source_fps: f64) -> f64 {
        self.output_fps.unwrap_or(source_fps)
    }
}

impl TryFrom<&StabilizationDefaults> for StabilizeSettings {
    type Error = StabError;

    fn try_from(defaults: &StabilizationDefaults) -> Result<Self, Self::Error> {
        let mode = defaults
            .mode
            .parse::<StabilizationMode>()
            .map_err(|e| StabError::config(e.to_string()))?;
        let settings = Self {
            mode,
            window_secs: defaults.window_secs,
            output_fps: None,
            crop: defaults.crop.parse()?,
            missing_motion: defaults.missing_motion.parse()?,
        };
        settings.validate()?;
        Ok(settings)
    }
}
