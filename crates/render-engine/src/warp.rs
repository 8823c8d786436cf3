//! Affine resampling of frames.

use image::{Rgb, RgbImage};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use steadyframe_common::error::{StabError, StabResult};
use steadyframe_model::{AffineTransform, FrameSize};

/// Produces `frame` mapped through `transform` onto a canvas of `size`.
///
/// The transform maps source pixel coordinates to output coordinates.
pub trait Resampler {
    fn warp(
        &self,
        frame: &RgbImage,
        transform: &AffineTransform,
        size: FrameSize,
    ) -> StabResult<RgbImage>;
}

/// `imageproc` warping; uncovered output pixels are black.
#[derive(Debug, Clone, Copy)]
pub struct ImageprocResampler {
    interpolation: Interpolation,
}

impl ImageprocResampler {
    pub fn new(interpolation: Interpolation) -> Self {
        Self { interpolation }
    }

    pub fn bilinear() -> Self {
        Self::new(Interpolation::Bilinear)
    }
}

impl Default for ImageprocResampler {
    fn default() -> Self {
        Self::bilinear()
    }
}

impl Resampler for ImageprocResampler {
    fn warp(
        &self,
        frame: &RgbImage,
        transform: &AffineTransform,
        size: FrameSize,
    ) -> StabResult<RgbImage> {
        size.validate()?;
        if transform.is_identity() && frame.dimensions() == (size.width, size.height) {
            return Ok(frame.clone());
        }

        let projection = Projection::from_matrix(transform.to_homogeneous_f32())
            .ok_or_else(|| StabError::invariant(format!("transform is not invertible: {:?}", transform.m)))?;
        let mut out = RgbImage::new(size.width, size.height);
        warp_into(frame, &projection, self.interpolation, Rgb([0, 0, 0]), &mut out);
        Ok(out)
    }
}
