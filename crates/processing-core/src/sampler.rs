//! Motion sampler: the first pass over the source.

use image::GrayImage;
use steadyframe_common::cancel::CancelToken;
use steadyframe_common::error::StabResult;
use steadyframe_model::{MissingMotionPolicy, MotionSample, Trajectory};

use crate::motion::MotionEstimator;

/// Result of a sampling pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SamplingOutcome {
    /// One entry per frame read.
    pub trajectory: Trajectory,

    /// Frame pairs for which the estimator had no confident answer.
    pub missing_estimates: usize,
}

impl SamplingOutcome {
    pub fn frames(&self) -> usize {
        self.trajectory.len()
    }
}

/// Drives the estimator over consecutive frames and accumulates the trajectory.
pub struct MotionSampler<E> {
    estimator: E,
    missing_policy: MissingMotionPolicy,
    cancel: CancelToken,
}

impl<E: MotionEstimator> MotionSampler<E> {
    pub fn new(estimator: E) -> Self {
        Self {
            estimator,
            missing_policy: MissingMotionPolicy::default(),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_missing_policy(mut self, policy: MissingMotionPolicy) -> Self {
        self.missing_policy = policy;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Sample a frame stream without progress reporting.
    pub fn sample<I>(&mut self, frames: I) -> StabResult<SamplingOutcome>
    where
        I: IntoIterator<Item = StabResult<GrayImage>>,
    {
        self.sample_with_progress(frames, |_| {})
    }

    /// Sample a frame stream, calling `progress` with the number of frames read.
    ///
    /// Zero frames yields an empty trajectory. A frame read error or a
    /// cancellation aborts the pass; a missing estimate never does.
    pub fn sample_with_progress<I, P>(
        &mut self,
        frames: I,
        mut progress: P,
    ) -> StabResult<SamplingOutcome>
    where
        I: IntoIterator<Item = StabResult<GrayImage>>,
        P: FnMut(usize),
    {
        let mut frames = frames.into_iter();
        let mut outcome = SamplingOutcome::default();

        self.cancel.check()?;
        let Some(first) = frames.next().transpose()? else {
            tracing::warn!("Source yielded no frames");
            return Ok(outcome);
        };
        outcome.trajectory.push_reference();
        progress(1);

        let mut prev = first;
        let mut last_good = MotionSample::ZERO;
        for frame in frames {
            self.cancel.check()?;
            let curr = frame?;
            let index = outcome.trajectory.len();

            let sample = match self.estimator.estimate(&prev, &curr) {
                Some(sample) if sample.is_finite() => {
                    last_good = sample;
                    sample
                }
                _ => {
                    outcome.missing_estimates += 1;
                    let substitute = match self.missing_policy {
                        MissingMotionPolicy::Zero => MotionSample::ZERO,
                        MissingMotionPolicy::HoldLast => last_good,
                    };
                    tracing::warn!(
                        frame = index,
                        policy = %self.missing_policy,
                        "No confident motion estimate, substituting"
                    );
                    substitute
                }
            };

            tracing::debug!(
                frame = index,
                dx = sample.dx,
                dy = sample.dy,
                dangle = sample.dangle,
                "Sampled motion"
            );
            outcome.trajectory.push_sample(sample);
            progress(outcome.trajectory.len());
            prev = curr;
        }

        tracing::info!(
            frames = outcome.frames(),
            missing = outcome.missing_estimates,
            "Motion sampling complete"
        );
        Ok(outcome)
    }
}
