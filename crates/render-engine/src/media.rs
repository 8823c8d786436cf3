//! Frame source and sink interfaces.

use image::{GrayImage, RgbImage};
use serde::{Deserialize, Serialize};
use steadyframe_common::error::StabResult;
use steadyframe_model::{FrameSize, Rotation};

/// Stream properties reported by a frame source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Frame size after `rotation` has been applied.
    pub size: FrameSize,

    /// Frames per second.
    pub fps: f64,

    /// Frame count reported by the container, if any. The number of frames
    /// actually readable may be lower.
    pub frame_count: Option<u64>,

    /// Fixed rotation applied to every decoded frame.
    pub rotation: Rotation,
}

/// Ordered, rewindable stream of color frames of a fixed size.
pub trait FrameSource {
    fn info(&self) -> &VideoInfo;

    /// Next frame, or `None` at end of stream.
    fn next_frame(&mut self) -> StabResult<Option<RgbImage>>;

    /// Restart from the first frame.
    fn rewind(&mut self) -> StabResult<()>;
}

/// Ordered frame consumer.
pub trait FrameSink {
    fn write_frame(&mut self, frame: &RgbImage) -> StabResult<()>;

    /// Flush and close. Calling it again is a no-op.
    fn finish(&mut self) -> StabResult<()>;
}

/// Grayscale view of a source, as consumed by the motion sampler.
pub struct GrayFrames<'a> {
    source: &'a mut dyn FrameSource,
    done: bool,
}

/// Iterate the remaining frames of `source` converted to grayscale.
///
/// Iteration stops after the first read error.
pub fn gray_frames(source: &mut dyn FrameSource) -> GrayFrames<'_> {
    GrayFrames {
        source,
        done: false,
    }
}

impl Iterator for GrayFrames<'_> {
    type Item = StabResult<GrayImage>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.source.next_frame() {
            Ok(Some(frame)) => Some(Ok(image::imageops::grayscale(&frame))),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

/// Rotate a decoded frame clockwise by a fixed rotation.
pub fn apply_rotation(frame: RgbImage, rotation: Rotation) -> RgbImage {
    use image::imageops;
    match rotation {
        Rotation::None => frame,
        Rotation::Cw90 => imageops::rotate90(&frame),
        Rotation::Cw180 => imageops::rotate180(&frame),
        Rotation::Cw270 => imageops::rotate270(&frame),
    }
}
