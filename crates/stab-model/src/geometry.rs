//! Frame dimensions and fixed decode-time rotation.

use serde::{Deserialize, Serialize};
use steadyframe_common::error::{StabError, StabResult};

/// Frame dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Frame center in pixel coordinates.
    pub fn center(&self) -> (f64, f64) {
        (self.width as f64 / 2.0, self.height as f64 / 2.0)
    }

    /// Reject degenerate dimensions before they reach any division.
    pub fn validate(&self) -> StabResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(StabError::invariant(format!(
                "frame dimensions must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }

    /// Size after applying a fixed rotation (width/height swap for 90/270).
    pub fn rotated(&self, rotation: Rotation) -> FrameSize {
        if rotation.swaps_dimensions() {
            FrameSize::new(self.height, self.width)
        } else {
            *self
        }
    }

    /// Bytes in one packed 8-bit frame with `channels` channels.
    pub fn byte_len(&self, channels: usize) -> usize {
        self.width as usize * self.height as usize * channels
    }
}

impl std::fmt::Display for FrameSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Clockwise rotation applied uniformly to every decoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    None,
    Cw90,
    Cw180,
    Cw270,
}

impl Rotation {
    /// Map a rotation in degrees (any multiple of 90, possibly negative)
    /// to the clockwise rotation to apply. Other values mean no rotation.
    pub fn from_degrees(degrees: i64) -> Rotation {
        match degrees.rem_euclid(360) {
            90 => Rotation::Cw90,
            180 => Rotation::Cw180,
            270 => Rotation::Cw270,
            _ => Rotation::None,
        }
    }

    pub fn degrees(self) -> u32 {
        match self {
            Rotation::None => 0,
            Rotation::Cw90 => 90,
            Rotation::Cw180 => 180,
            Rotation::Cw270 => 270,
        }
    }

    pub fn swaps_dimensions(self) -> bool {
        matches!(self, Rotation::Cw90 | Rotation::Cw270)
    }
}
