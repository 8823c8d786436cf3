//! Frame-to-frame motion estimation.
//!
//! [`MotionEstimator`] is the seam the sampler calls; anything that can turn
//! two consecutive grayscale frames into a rigid motion (or decline to) fits.
//! [`BlockMatchEstimator`] is the built-in implementation, assembled from
//! `imageproc` primitives:
//!
//! 1. FAST-9 corners on the previous frame, optionally limited to a
//!    [`FeatureRegion`], ranked by the smaller eigenvalue of the Sobel
//!    structure tensor and kept at least `min_distance` apart.
//! 2. Each corner is tracked into the current frame with `match_template`
//!    (sum of squared errors), coarse to fine over an image pyramid, with a
//!    parabolic sub-pixel step on the final score surface.
//! 3. Rotation + translation fitted by least squares, dropping points whose
//!    residual stays far above the median.

use std::fmt;
use std::str::FromStr;

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};
use imageproc::corners::corners_fast9;
use imageproc::definitions::Image;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use imageproc::template_matching::{find_extremes, match_template, MatchTemplateMethod};
use serde::{Deserialize, Serialize};
use steadyframe_common::StabError;
use steadyframe_model::MotionSample;

/// Estimates the rigid motion between two consecutive grayscale frames.
///
/// Returns `None` when there is no confident estimate; the caller decides
/// what to record in that case.
pub trait MotionEstimator {
    fn estimate(&mut self, prev: &GrayImage, curr: &GrayImage) -> Option<MotionSample>;
}

impl<F> MotionEstimator for F
where
    F: FnMut(&GrayImage, &GrayImage) -> Option<MotionSample>,
{
    fn estimate(&mut self, prev: &GrayImage, curr: &GrayImage) -> Option<MotionSample> {
        self(prev, curr)
    }
}

/// Pixel rectangle that limits where features are picked.
///
/// Parsed from `x,y,width,height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FeatureRegion {
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && y >= self.y && x - self.x < self.width && y - self.y < self.height
    }
}

impl FromStr for FeatureRegion {
    type Err = StabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            StabError::config(format!(
                "invalid feature region `{s}`: expected `x,y,width,height`"
            ))
        };
        let parts = s
            .split(',')
            .map(|part| part.trim().parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| invalid())?;
        let [x, y, width, height]: [u32; 4] = parts.try_into().map_err(|_| invalid())?;
        if width == 0 || height == 0 {
            return Err(StabError::config(format!("feature region `{s}` is empty")));
        }
        Ok(Self {
            x,
            y,
            width,
            height,
        })
    }
}

impl fmt::Display for FeatureRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.x, self.y, self.width, self.height)
    }
}

/// Tuning for [`BlockMatchEstimator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockMatchConfig {
    /// Upper bound on tracked points per frame pair.
    pub max_points: usize,

    /// Points scoring below `quality_level * best_score` are ignored.
    pub quality_level: f64,

    /// Minimum spacing between tracked points, in pixels.
    pub min_distance: u32,

    /// FAST-9 intensity threshold for corner candidates.
    pub fast_threshold: u8,

    /// Half size of the matching block (block is `2r + 1` square).
    pub block_radius: u32,

    /// Search half width at the coarsest pyramid level.
    pub search_radius: u32,

    /// Search half width when refining on finer levels.
    pub refine_radius: u32,

    /// Maximum number of pyramid levels, including full resolution.
    pub pyramid_levels: usize,

    /// Reject a match whose root mean squared difference per pixel exceeds this.
    pub max_rms_diff: f64,

    /// Fewer surviving points than this means no confident estimate.
    pub min_tracked_points: usize,

    /// Residuals below this (pixels) are always kept as inliers.
    pub inlier_threshold: f64,

    /// Refit rounds for outlier rejection.
    pub fit_iterations: usize,

    /// Pick features only inside this rectangle of the previous frame.
    pub feature_region: Option<FeatureRegion>,
}

impl Default for BlockMatchConfig {
    fn default() -> Self {
        Self {
            max_points: 200,
            quality_level: 0.01,
            min_distance: 30,
            fast_threshold: 20,
            block_radius: 7,
            search_radius: 8,
            refine_radius: 2,
            pyramid_levels: 3,
            max_rms_diff: 40.0,
            min_tracked_points: 6,
            inlier_threshold: 1.5,
            fit_iterations: 4,
            feature_region: None,
        }
    }
}

/// Built-in estimator: corner features, pyramid template matching, rigid fit.
#[derive(Debug, Clone, Default)]
pub struct BlockMatchEstimator {
    config: BlockMatchConfig,
}

impl BlockMatchEstimator {
    pub fn new(config: BlockMatchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BlockMatchConfig {
        &self.config
    }

    /// Build matching pyramids for both frames. Level 0 is full resolution.
    fn pyramids(&self, prev: &GrayImage, curr: &GrayImage) -> (Vec<GrayImage>, Vec<GrayImage>) {
        let min_dim = 2 * (self.config.block_radius + self.config.search_radius) + 1;
        let mut prev_levels = vec![prev.clone()];
        let mut curr_levels = vec![curr.clone()];

        while prev_levels.len() < self.config.pyramid_levels.max(1) {
            let (w, h) = match prev_levels.last() {
                Some(top) => (top.width() / 2, top.height() / 2),
                None => break,
            };
            if w < min_dim || h < min_dim {
                break;
            }
            let p = imageops::resize(&prev_levels[prev_levels.len() - 1], w, h, FilterType::Triangle);
            let c = imageops::resize(&curr_levels[curr_levels.len() - 1], w, h, FilterType::Triangle);
            prev_levels.push(p);
            curr_levels.push(c);
        }
        (prev_levels, curr_levels)
    }

    /// Track one full-resolution point from `prev` into `curr`.
    fn track(&self, prev: &[GrayImage], curr: &[GrayImage], x: u32, y: u32) -> Option<(f64, f64)> {
        let r = self.config.block_radius;
        let top = prev.len().checked_sub(1)?;
        let (mut dx, mut dy) = (0i64, 0i64);
        let mut found = None;

        for level in (0..=top).rev() {
            let (px, py) = (x >> level, y >> level);
            dx *= 2;
            dy *= 2;
            let radius = if level == top {
                self.config.search_radius
            } else {
                self.config.refine_radius
            };
            let guess = (px as i64 + dx, py as i64 + dy);
            let m = match_block(&prev[level], &curr[level], (px, py), guess, r, radius)?;
            dx = m.x - px as i64;
            dy = m.y - py as i64;
            found = Some(m);
        }

        let m = found?;
        let area = f64::from(2 * r + 1).powi(2);
        if (m.score / area).sqrt() > self.config.max_rms_diff {
            return None;
        }
        if m.score <= 0.0 {
            return Some((m.x as f64, m.y as f64));
        }
        Some((m.x as f64 + m.sub_x, m.y as f64 + m.sub_y))
    }
}

impl MotionEstimator for BlockMatchEstimator {
    fn estimate(&mut self, prev: &GrayImage, curr: &GrayImage) -> Option<MotionSample> {
        if prev.dimensions() != curr.dimensions() {
            tracing::debug!(
                prev = ?prev.dimensions(),
                curr = ?curr.dimensions(),
                "Frame size changed between samples"
            );
            return None;
        }

        let features = select_features(prev, &self.config);
        if features.len() < self.config.min_tracked_points {
            tracing::debug!(features = features.len(), "Too few trackable features");
            return None;
        }

        let (prev_levels, curr_levels) = self.pyramids(prev, curr);
        let mut src = Vec::with_capacity(features.len());
        let mut dst = Vec::with_capacity(features.len());
        for &(x, y) in &features {
            if let Some(tracked) = self.track(&prev_levels, &curr_levels, x, y) {
                src.push((x as f64, y as f64));
                dst.push(tracked);
            }
        }

        if src.len() < self.config.min_tracked_points {
            tracing::debug!(
                features = features.len(),
                tracked = src.len(),
                "Too few points tracked"
            );
            return None;
        }

        let fit = fit_rigid_robust(
            &src,
            &dst,
            self.config.inlier_threshold,
            self.config.fit_iterations,
            self.config.min_tracked_points,
        )?;
        let sample = MotionSample::new(fit.tx, fit.ty, fit.angle);
        sample.is_finite().then_some(sample)
    }
}

/// Rotation about the origin followed by translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidFit {
    pub angle: f64,
    pub tx: f64,
    pub ty: f64,
}

impl RigidFit {
    pub fn apply(&self, (x, y): (f64, f64)) -> (f64, f64) {
        let (sin, cos) = self.angle.sin_cos();
        (cos * x - sin * y + self.tx, sin * x + cos * y + self.ty)
    }

    fn residual(&self, src: (f64, f64), dst: (f64, f64)) -> f64 {
        let (x, y) = self.apply(src);
        (x - dst.0).hypot(y - dst.1)
    }
}

/// Least-squares rigid transform mapping `src[i]` onto `dst[i]` for the
/// given indices.
fn fit_subset(src: &[(f64, f64)], dst: &[(f64, f64)], indices: &[usize]) -> Option<RigidFit> {
    if indices.len() < 2 {
        return None;
    }
    let n = indices.len() as f64;
    let (mut pcx, mut pcy, mut qcx, mut qcy) = (0.0, 0.0, 0.0, 0.0);
    for &i in indices {
        pcx += src[i].0;
        pcy += src[i].1;
        qcx += dst[i].0;
        qcy += dst[i].1;
    }
    let (pcx, pcy, qcx, qcy) = (pcx / n, pcy / n, qcx / n, qcy / n);

    let (mut a, mut b) = (0.0, 0.0);
    for &i in indices {
        let (px, py) = (src[i].0 - pcx, src[i].1 - pcy);
        let (qx, qy) = (dst[i].0 - qcx, dst[i].1 - qcy);
        a += px * qx + py * qy;
        b += px * qy - py * qx;
    }

    let angle = if a == 0.0 && b == 0.0 { 0.0 } else { b.atan2(a) };
    let (sin, cos) = angle.sin_cos();
    Some(RigidFit {
        angle,
        tx: qcx - (cos * pcx - sin * pcy),
        ty: qcy - (sin * pcx + cos * pcy),
    })
}

/// Rigid fit with iterative residual-based outlier rejection.
///
/// Each round keeps points whose residual is below
/// `max(inlier_threshold, 2.5 * median residual)` and refits.
pub fn fit_rigid_robust(
    src: &[(f64, f64)],
    dst: &[(f64, f64)],
    inlier_threshold: f64,
    iterations: usize,
    min_points: usize,
) -> Option<RigidFit> {
    let n = src.len().min(dst.len());
    let mut inliers: Vec<usize> = (0..n).collect();
    let mut fit = fit_subset(src, dst, &inliers)?;

    for _ in 0..iterations {
        let residuals: Vec<f64> = (0..n).map(|i| fit.residual(src[i], dst[i])).collect();
        let mut current: Vec<f64> = inliers.iter().map(|&i| residuals[i]).collect();
        current.sort_by(|a, b| a.total_cmp(b));
        let median = current.get(current.len() / 2).copied().unwrap_or(0.0);
        let cutoff = inlier_threshold.max(2.5 * median);

        let next: Vec<usize> = (0..n).filter(|&i| residuals[i] <= cutoff).collect();
        if next.len() < min_points.max(2) {
            return None;
        }
        if next == inliers {
            break;
        }
        inliers = next;
        fit = fit_subset(src, dst, &inliers)?;
    }
    Some(fit)
}

/// Corner points ranked by texture, at least `min_distance` apart.
fn select_features(img: &GrayImage, config: &BlockMatchConfig) -> Vec<(u32, u32)> {
    let (w, h) = img.dimensions();
    let margin = config.block_radius + 1;
    if w <= 2 * margin || h <= 2 * margin {
        return Vec::new();
    }

    let corners = corners_fast9(img, config.fast_threshold);
    let in_bounds = |x: u32, y: u32| x >= margin && y >= margin && x < w - margin && y < h - margin;
    let in_region = |x: u32, y: u32| config.feature_region.map_or(true, |r| r.contains(x, y));
    let points: Vec<(u32, u32)> = corners
        .iter()
        .map(|c| (c.x, c.y))
        .filter(|&(x, y)| in_bounds(x, y) && in_region(x, y))
        .collect();
    if points.is_empty() {
        return Vec::new();
    }

    let gx = horizontal_sobel(img);
    let gy = vertical_sobel(img);
    let mut candidates: Vec<(f64, u32, u32)> = points
        .into_iter()
        .map(|(x, y)| (min_eigenvalue(&gx, &gy, x, y, config.block_radius), x, y))
        .filter(|c| c.0 > 0.0)
        .collect();

    let Some(best) = candidates.iter().map(|c| c.0).max_by(|a, b| a.total_cmp(b)) else {
        return Vec::new();
    };
    let floor = best * config.quality_level;
    candidates.retain(|c| c.0 >= floor);
    candidates.sort_by(|a, b| b.0.total_cmp(&a.0));

    let min_dist_sq = (config.min_distance as i64).pow(2);
    let mut picked: Vec<(u32, u32)> = Vec::with_capacity(config.max_points);
    for (_, x, y) in candidates {
        if picked.len() >= config.max_points {
            break;
        }
        let far_enough = picked.iter().all(|&(px, py)| {
            let (dx, dy) = (px as i64 - x as i64, py as i64 - y as i64);
            dx * dx + dy * dy >= min_dist_sq
        });
        if far_enough {
            picked.push((x, y));
        }
    }
    picked
}

/// Smaller eigenvalue of the Sobel structure tensor around `(cx, cy)`.
///
/// Caller guarantees the window is inside the image.
fn min_eigenvalue(
    gx: &Image<Luma<i16>>,
    gy: &Image<Luma<i16>>,
    cx: u32,
    cy: u32,
    radius: u32,
) -> f64 {
    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for y in cy - radius..=cy + radius {
        for x in cx - radius..=cx + radius {
            let dx = f64::from(gx.get_pixel(x, y)[0]);
            let dy = f64::from(gy.get_pixel(x, y)[0]);
            sxx += dx * dx;
            syy += dy * dy;
            sxy += dx * dy;
        }
    }
    let half_trace = (sxx + syy) * 0.5;
    let spread = (((sxx - syy) * 0.5).powi(2) + sxy * sxy).sqrt();
    half_trace - spread
}

/// Best match for one block, in the coordinates of the current frame.
struct BlockMatch {
    x: i64,
    y: i64,
    /// Sum of squared differences at `(x, y)`.
    score: f64,
    sub_x: f64,
    sub_y: f64,
}

/// Search for the block centred on `at` in `prev` within `radius` pixels of
/// `guess` in `curr`.
///
/// `None` when the block leaves `prev` or the clipped search window is too
/// small to slide the block over.
fn match_block(
    prev: &GrayImage,
    curr: &GrayImage,
    at: (u32, u32),
    guess: (i64, i64),
    r: u32,
    radius: u32,
) -> Option<BlockMatch> {
    let side = 2 * r + 1;
    let (px, py) = at;
    let (w, h) = prev.dimensions();
    if px < r || py < r || px + r >= w || py + r >= h {
        return None;
    }
    let template = imageops::crop_imm(prev, px - r, py - r, side, side).to_image();

    let (cw, ch) = curr.dimensions();
    let reach = i64::from(r + radius);
    let x0 = (guess.0 - reach).max(0);
    let y0 = (guess.1 - reach).max(0);
    let x1 = (guess.0 + reach).min(i64::from(cw) - 1);
    let y1 = (guess.1 + reach).min(i64::from(ch) - 1);
    if x1 - x0 + 1 <= i64::from(side) || y1 - y0 + 1 <= i64::from(side) {
        return None;
    }
    let (sw, sh) = ((x1 - x0 + 1) as u32, (y1 - y0 + 1) as u32);
    let window = imageops::crop_imm(curr, x0 as u32, y0 as u32, sw, sh).to_image();

    let scores = match_template(&window, &template, MatchTemplateMethod::SumOfSquaredErrors);
    let extremes = find_extremes(&scores);
    let (lx, ly) = extremes.min_value_location;
    let center = f64::from(extremes.min_value);
    let score_at = |x: i64, y: i64| {
        let inside = x >= 0 && y >= 0 && x < i64::from(scores.width()) && y < i64::from(scores.height());
        inside.then(|| f64::from(scores.get_pixel(x as u32, y as u32)[0]))
    };
    let (lx, ly) = (i64::from(lx), i64::from(ly));

    Some(BlockMatch {
        x: x0 + lx + i64::from(r),
        y: y0 + ly + i64::from(r),
        score: center,
        sub_x: parabolic_offset(score_at(lx - 1, ly), center, score_at(lx + 1, ly)),
        sub_y: parabolic_offset(score_at(lx, ly - 1), center, score_at(lx, ly + 1)),
    })
}

/// Vertex offset of the parabola through three match scores, in `[-0.5, 0.5]`.
fn parabolic_offset(left: Option<f64>, center: f64, right: Option<f64>) -> f64 {
    let (Some(l), Some(r)) = (left, right) else {
        return 0.0;
    };
    let denom = l - 2.0 * center + r;
    if denom <= 0.0 {
        return 0.0;
    }
    ((l - r) / (2.0 * denom)).clamp(-0.5, 0.5)
}
