//! OpenCV motion estimator, enabled by the `opencv` feature.
//!
//! Good-features-to-track corners, pyramidal Lucas-Kanade tracking and a
//! RANSAC partial affine fit, read back as translation plus rotation.

use std::ops::Deref;

use image::{GrayImage, Luma};
use opencv::core::{self, Mat, Point2f, Size, TermCriteria, Vector};
use opencv::prelude::*;
use opencv::{calib3d, imgproc, video};
use serde::{Deserialize, Serialize};
use steadyframe_model::MotionSample;

use crate::motion::{FeatureRegion, MotionEstimator};

/// Tuning for [`OpticalFlowEstimator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpticalFlowConfig {
    pub max_corners: i32,
    pub quality_level: f64,
    pub min_distance: f64,
    pub block_size: i32,

    /// Lucas-Kanade window side, in pixels.
    pub win_size: i32,

    /// Pyramid levels above full resolution.
    pub max_level: i32,

    /// RANSAC reprojection threshold, in pixels.
    pub ransac_threshold: f64,

    /// Fewer tracked points than this means no confident estimate.
    pub min_tracked_points: usize,

    /// Pick features only inside this rectangle of the previous frame.
    pub feature_region: Option<FeatureRegion>,
}

impl Default for OpticalFlowConfig {
    fn default() -> Self {
        Self {
            max_corners: 200,
            quality_level: 0.01,
            min_distance: 30.0,
            block_size: 10,
            win_size: 21,
            max_level: 3,
            ransac_threshold: 3.0,
            min_tracked_points: 6,
            feature_region: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OpticalFlowEstimator {
    config: OpticalFlowConfig,
}

impl OpticalFlowEstimator {
    pub fn new(config: OpticalFlowConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OpticalFlowConfig {
        &self.config
    }

    fn try_estimate(&self, prev: &GrayImage, curr: &GrayImage) -> opencv::Result<Option<MotionSample>> {
        let prev_mat = gray_mat(prev)?;
        let curr_mat = gray_mat(curr)?;

        let region_image = self.config.feature_region.map(|region| {
            GrayImage::from_fn(prev.width(), prev.height(), |x, y| {
                Luma([if region.contains(x, y) { 255 } else { 0 }])
            })
        });
        let region_mat = region_image.as_ref().map(gray_mat).transpose()?;
        let no_mask = Mat::default();
        let mask: &Mat = region_mat.as_deref().unwrap_or(&no_mask);

        let mut prev_pts = Vector::<Point2f>::new();
        imgproc::good_features_to_track(
            &*prev_mat,
            &mut prev_pts,
            self.config.max_corners,
            self.config.quality_level,
            self.config.min_distance,
            mask,
            self.config.block_size,
            false,
            0.04,
        )?;
        if prev_pts.len() < self.config.min_tracked_points {
            tracing::debug!(features = prev_pts.len(), "Too few trackable features");
            return Ok(None);
        }

        let mut curr_pts = Vector::<Point2f>::new();
        let mut status = Vector::<u8>::new();
        let mut err = Vector::<f32>::new();
        let criteria = TermCriteria::new(core::TermCriteria_COUNT + core::TermCriteria_EPS, 30, 0.01)?;
        video::calc_optical_flow_pyr_lk(
            &*prev_mat,
            &*curr_mat,
            &prev_pts,
            &mut curr_pts,
            &mut status,
            &mut err,
            Size::new(self.config.win_size, self.config.win_size),
            self.config.max_level,
            criteria,
            0,
            1e-4,
        )?;

        let mut src = Vector::<Point2f>::new();
        let mut dst = Vector::<Point2f>::new();
        for ((p, c), ok) in prev_pts.iter().zip(curr_pts.iter()).zip(status.iter()) {
            if ok == 1 {
                src.push(p);
                dst.push(c);
            }
        }
        if src.len() < self.config.min_tracked_points {
            tracing::debug!(
                features = prev_pts.len(),
                tracked = src.len(),
                "Too few points tracked"
            );
            return Ok(None);
        }

        let mut inliers = Mat::default();
        let m = calib3d::estimate_affine_partial_2d(
            &src,
            &dst,
            &mut inliers,
            calib3d::RANSAC,
            self.config.ransac_threshold,
            2000,
            0.99,
            10,
        )?;
        if m.empty() {
            return Ok(None);
        }

        let at = |row: i32, col: i32| m.at_2d::<f64>(row, col).copied();
        let sample = MotionSample::new(at(0, 2)?, at(1, 2)?, at(1, 0)?.atan2(at(0, 0)?));
        Ok(sample.is_finite().then_some(sample))
    }
}

impl MotionEstimator for OpticalFlowEstimator {
    fn estimate(&mut self, prev: &GrayImage, curr: &GrayImage) -> Option<MotionSample> {
        if prev.dimensions() != curr.dimensions() {
            tracing::debug!(
                prev = ?prev.dimensions(),
                curr = ?curr.dimensions(),
                "Frame size changed between samples"
            );
            return None;
        }
        match self.try_estimate(prev, curr) {
            Ok(sample) => sample,
            Err(e) => {
                tracing::debug!(error = %e, "OpenCV motion estimate failed");
                None
            }
        }
    }
}

/// Borrow a grayscale buffer as a single-channel `Mat`.
fn gray_mat(img: &GrayImage) -> opencv::Result<impl Deref<Target = Mat> + '_> {
    Mat::new_rows_cols_with_data(img.height() as i32, img.width() as i32, img.as_raw().as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texture(x: i64, y: i64) -> u8 {
        let (cx, cy) = (x.div_euclid(4), y.div_euclid(4));
        let mut h = (cx.wrapping_mul(73_856_093) ^ cy.wrapping_mul(19_349_663)) as u64;
        h ^= h >> 13;
        h = h.wrapping_mul(0x5bd1_e995);
        h ^= h >> 15;
        (h & 0xff) as u8
    }

    fn shifted(dx: i64, dy: i64) -> GrayImage {
        GrayImage::from_fn(160, 120, |x, y| Luma([texture(x as i64 - dx, y as i64 - dy)]))
    }

    #[test]
    fn test_recovers_translation() {
        let mut estimator = OpticalFlowEstimator::new(OpticalFlowConfig {
            min_distance: 12.0,
            ..Default::default()
        });
        let sample = estimator
            .estimate(&shifted(0, 0), &shifted(2, 1))
            .expect("textured frames");
        assert!((sample.dx - 2.0).abs() < 0.5, "dx = {}", sample.dx);
        assert!((sample.dy - 1.0).abs() < 0.5, "dy = {}", sample.dy);
    }

    #[test]
    fn test_flat_frames_have_no_estimate() {
        let flat = GrayImage::from_pixel(120, 90, Luma([128]));
        assert!(OpticalFlowEstimator::default().estimate(&flat, &flat).is_none());
    }
}
