use image::GrayImage;
use proptest::prelude::*;
use steadyframe_common::error::StabResult;
use steadyframe_model::{FrameSize, MotionSample, StabilizationMode, Trajectory};
use steadyframe_processing_core::{compute_crop, MotionSampler, Stabilizer};

fn sample_constant(frames: usize, motion: MotionSample) -> Trajectory {
    let source = (0..frames).map(|_| -> StabResult<GrayImage> { Ok(GrayImage::new(16, 16)) });
    MotionSampler::new(move |_: &GrayImage, _: &GrayImage| Some(motion))
        .sample(source)
        .expect("sampling never fails on a clean source")
        .trajectory
}

#[test]
fn static_sequence_needs_no_correction_or_crop() {
    let trajectory = sample_constant(10, MotionSample::ZERO);
    assert_eq!(trajectory.len(), 10);

    let corrections = Stabilizer::new(StabilizationMode::Generic, 2)
        .stabilize(&trajectory)
        .unwrap();
    assert_eq!(corrections.len(), 10);
    assert!(corrections
        .iter()
        .all(|c| c.tx == 0.0 && c.ty == 0.0 && c.ta == 0.0));

    let crop = compute_crop(&corrections, FrameSize::new(320, 240)).unwrap();
    assert_eq!(crop, 0.0);
}

#[test]
fn horizontal_pan_is_reproduced() {
    let trajectory = sample_constant(20, MotionSample::new(5.0, 0.0, 0.0));
    assert_eq!(trajectory.x.last().copied(), Some(95.0));

    let stabilizer = Stabilizer::new(StabilizationMode::HPan, 30);
    let target = stabilizer.target(&trajectory).unwrap();
    for (t, x) in target.x.iter().enumerate() {
        assert!((x - 5.0 * t as f64).abs() < 1e-9, "frame {t}: {x}");
    }

    let corrections = stabilizer.stabilize(&trajectory).unwrap();
    assert!(corrections.tx.iter().all(|v| v.abs() < 1e-9));
    assert!(corrections.ty.iter().all(|v| *v == 0.0));
}

#[test]
fn still_mode_cancels_the_trajectory() {
    let trajectory = sample_constant(8, MotionSample::new(1.5, -0.5, 0.002));
    let corrections = Stabilizer::new(StabilizationMode::Still, 2)
        .stabilize(&trajectory)
        .unwrap();
    for (t, c) in corrections.iter().enumerate() {
        assert_eq!(c.tx, -trajectory.x[t]);
        assert_eq!(c.ty, -trajectory.y[t]);
        assert_eq!(c.ta, -trajectory.angle[t]);
    }
}

#[test]
fn pan_modes_with_rotation_smooth_the_angle() {
    let trajectory = Trajectory::from_samples(&[
        MotionSample::new(2.0, 1.0, 0.02),
        MotionSample::new(2.0, 1.0, -0.02),
        MotionSample::new(2.0, 1.0, 0.02),
        MotionSample::new(2.0, 1.0, -0.02),
    ]);
    let target = Stabilizer::new(StabilizationMode::PanA, 1)
        .target(&trajectory)
        .unwrap();
    assert!(target.angle.iter().all(|a| *a > 0.0 && *a < 0.02));
}

fn trajectory_strategy() -> impl Strategy<Value = Trajectory> {
    prop::collection::vec((-20.0f64..20.0, -20.0f64..20.0, -0.05f64..0.05), 0..60).prop_map(
        |samples| {
            let samples: Vec<MotionSample> = samples
                .into_iter()
                .map(|(dx, dy, da)| MotionSample::new(dx, dy, da))
                .collect();
            Trajectory::from_samples(&samples)
        },
    )
}

proptest! {
    #[test]
    fn generic_a_never_corrects_toward_nonzero_angle(
        trajectory in trajectory_strategy(),
        window in 0usize..30,
    ) {
        let stabilizer = Stabilizer::new(StabilizationMode::GenericA, window);
        let target = stabilizer.target(&trajectory).unwrap();
        prop_assert!(target.angle.iter().all(|a| *a == 0.0));

        let corrections = stabilizer.stabilize(&trajectory).unwrap();
        for (t, ta) in corrections.ta.iter().enumerate() {
            prop_assert_eq!(*ta, -trajectory.angle[t]);
        }
    }

    #[test]
    fn no_rotation_leaves_translation_alone(trajectory in trajectory_strategy()) {
        let corrections = Stabilizer::new(StabilizationMode::NoRotation, 5)
            .stabilize(&trajectory)
            .unwrap();
        prop_assert!(corrections.tx.iter().all(|v| *v == 0.0));
        prop_assert!(corrections.ty.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn every_mode_preserves_length(trajectory in trajectory_strategy(), window in 0usize..10) {
        for mode in StabilizationMode::ALL {
            let corrections = Stabilizer::new(mode, window).stabilize(&trajectory).unwrap();
            prop_assert_eq!(corrections.len(), trajectory.len());
            let crop = compute_crop(&corrections, FrameSize::new(640, 480)).unwrap();
            prop_assert!((0.0..=0.40).contains(&crop));
        }
    }
}
