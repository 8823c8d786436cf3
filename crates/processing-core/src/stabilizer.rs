//! Trajectory stabilizer.
//!
//! Looks up the per-axis behavior of the selected mode, builds the target
//! path for each axis, and returns `target - raw` as the per-frame correction.

use steadyframe_common::error::StabResult;
use steadyframe_model::{AxisBehavior, Corrections, StabilizationMode, Trajectory};

use crate::smoothing;

/// Mode-driven stabilizer. Cheap to construct; holds no per-run state.
#[derive(Debug, Clone, Copy)]
pub struct Stabilizer {
    mode: StabilizationMode,
    window: usize,
}

impl Stabilizer {
    /// `window` is the moving-average half width in frames.
    pub fn new(mode: StabilizationMode, window: usize) -> Self {
        Self { mode, window }
    }

    /// The path the camera should have followed.
    pub fn target(&self, trajectory: &Trajectory) -> StabResult<Trajectory> {
        trajectory.validate()?;

        let axes = self.mode.axes();
        Ok(Trajectory {
            x: self.axis_target(axes.x, &trajectory.x),
            y: self.axis_target(axes.y, &trajectory.y),
            angle: self.axis_target(axes.angle, &trajectory.angle),
        })
    }

    /// Per-frame correction deltas.
    pub fn stabilize(&self, trajectory: &Trajectory) -> StabResult<Corrections> {
        let target = self.target(trajectory)?;
        let corrections = Corrections {
            tx: smoothing::delta(&target.x, &trajectory.x),
            ty: smoothing::delta(&target.y, &trajectory.y),
            ta: smoothing::delta(&target.angle, &trajectory.angle),
        };

        tracing::debug!(
            mode = %self.mode,
            window = self.window,
            frames = corrections.len(),
            "Computed stabilization corrections"
        );
        Ok(corrections)
    }

    fn axis_target(&self, behavior: AxisBehavior, raw: &[f64]) -> Vec<f64> {
        match behavior {
            AxisBehavior::Zero => smoothing::zeros(raw.len()),
            AxisBehavior::Smoothed => smoothing::moving_average(raw, self.window),
            AxisBehavior::Distributed => smoothing::distribute(raw),
            AxisBehavior::Unmodified => raw.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use steadyframe_common::error::StabError;
    use steadyframe_model::MotionSample;

    fn wobbly() -> Trajectory {
        let samples: Vec<MotionSample> = (0..12)
            .map(|i| {
                let s = if i % 2 == 0 { 1.0 } else { -0.5 };
                MotionSample::new(3.0 * s, -2.0 * s + 0.25, 0.01 * s)
            })
            .collect();
        Trajectory::from_samples(&samples)
    }

    #[test]
    fn test_still_cancels_everything() {
        let trajectory = wobbly();
        let corrections = Stabilizer::new(StabilizationMode::Still, 5)
            .stabilize(&trajectory)
            .unwrap();

        for t in 0..trajectory.len() {
            let (x, y, a) = trajectory.get(t).unwrap();
            let c = corrections.get(t).unwrap();
            assert_eq!((c.tx, c.ty, c.ta), (-x, -y, -a));
        }
    }

    #[test]
    fn test_no_rotation_only_touches_angle() {
        let trajectory = wobbly();
        let stabilizer = Stabilizer::new(StabilizationMode::NoRotation, 3);
        let corrections = stabilizer.stabilize(&trajectory).unwrap();

        assert!(corrections.tx.iter().all(|&v| v == 0.0));
        assert!(corrections.ty.iter().all(|&v| v == 0.0));
        let target = stabilizer.target(&trajectory).unwrap();
        assert!(target.angle.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_generic_window_zero_is_noop() {
        let corrections = Stabilizer::new(StabilizationMode::Generic, 0)
            .stabilize(&wobbly())
            .unwrap();
        assert!(corrections.iter().all(|c| c.tx == 0.0 && c.ty == 0.0 && c.ta == 0.0));
    }

    #[test]
    fn test_degenerate_lengths() {
        let stabilizer = Stabilizer::new(StabilizationMode::Pan, 2);
        assert!(stabilizer.stabilize(&Trajectory::new()).unwrap().is_empty());

        let mut single = Trajectory::new();
        single.push_reference();
        for mode in StabilizationMode::ALL {
            let corrections = Stabilizer::new(mode, 2).stabilize(&single).unwrap();
            assert_eq!(corrections.len(), 1);
            let c = corrections.get(0).unwrap();
            assert_eq!((c.tx, c.ty, c.ta), (0.0, 0.0, 0.0));
        }
    }

    #[test]
    fn test_mismatched_axes_fail_fast() {
        let broken = Trajectory {
            x: vec![0.0, 1.0],
            y: vec![0.0, 1.0],
            angle: vec![0.0],
        };
        let err = Stabilizer::new(StabilizationMode::Generic, 2)
            .stabilize(&broken)
            .unwrap_err();
        assert!(matches!(err, StabError::Invariant { .. }));
    }
}
