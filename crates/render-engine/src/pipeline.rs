//! Two-pass stabilization driver.
//!
//! Pass one samples motion into a trajectory; the stabilizer and crop
//! synthesizer then run on the complete sequence; pass two replays the
//! source through the renderer.

use serde::Serialize;
use steadyframe_common::cancel::CancelToken;
use steadyframe_common::error::StabResult;
use steadyframe_model::{Corrections, FrameSize, StabilizeSettings, Trajectory};
use steadyframe_processing_core::{resolve_crop, MotionEstimator, MotionSampler, Stabilizer};

use crate::media::{gray_frames, FrameSink, FrameSource};
use crate::renderer::FrameRenderer;
use crate::warp::Resampler;

/// Stages of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineStage {
    Sampling,
    Stabilizing,
    Rendering,
    Finalizing,
    Complete,
}

/// Progress report.
#[derive(Debug, Clone)]
pub struct PipelineProgress {
    pub stage: PipelineStage,

    /// Frames done in the current stage.
    pub frames_done: u64,

    /// Expected frames for the stage, when known.
    pub total_frames: Option<u64>,
}

/// Progress callback.
pub type ProgressCallback = Box<dyn Fn(PipelineProgress) + Send>;

/// Everything derived before rendering.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub frame_size: FrameSize,
    pub source_fps: f64,
    pub window_frames: usize,
    pub missing_estimates: usize,
    pub crop_factor: f64,
    pub trajectory: Trajectory,
    pub target: Trajectory,
    pub corrections: Corrections,
}

impl Analysis {
    pub fn frames_sampled(&self) -> usize {
        self.trajectory.len()
    }
}

/// Outcome of a full run.
#[derive(Debug, Clone, Serialize)]
pub struct StabilizeSummary {
    pub frames_sampled: usize,
    pub frames_written: usize,
    pub missing_estimates: usize,
    pub window_frames: usize,
    pub crop_factor: f64,
    pub frame_size: FrameSize,
    pub source_fps: f64,
    pub corrections: Corrections,
    pub trajectory: Trajectory,
    pub target: Trajectory,
}

impl StabilizeSummary {
    fn new(analysis: Analysis, frames_written: usize) -> Self {
        Self {
            frames_sampled: analysis.frames_sampled(),
            frames_written,
            missing_estimates: analysis.missing_estimates,
            window_frames: analysis.window_frames,
            crop_factor: analysis.crop_factor,
            frame_size: analysis.frame_size,
            source_fps: analysis.source_fps,
            corrections: analysis.corrections,
            trajectory: analysis.trajectory,
            target: analysis.target,
        }
    }

    /// The pre-render part of the run.
    pub fn analysis(&self) -> Analysis {
        Analysis {
            frame_size: self.frame_size,
            source_fps: self.source_fps,
            window_frames: self.window_frames,
            missing_estimates: self.missing_estimates,
            crop_factor: self.crop_factor,
            trajectory: self.trajectory.clone(),
            target: self.target.clone(),
            corrections: self.corrections.clone(),
        }
    }
}

/// Configured stabilization run.
pub struct Pipeline {
    settings: StabilizeSettings,
    cancel: CancelToken,
    progress: Option<ProgressCallback>,
}

impl Pipeline {
    pub fn new(settings: StabilizeSettings) -> Self {
        Self {
            settings,
            cancel: CancelToken::new(),
            progress: None,
        }
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    fn report(&self, stage: PipelineStage, frames_done: u64, total_frames: Option<u64>) {
        if let Some(cb) = &self.progress {
            cb(PipelineProgress {
                stage,
                frames_done,
                total_frames,
            });
        }
    }

    /// Sampling, stabilization, and crop synthesis. Leaves the source at its end.
    pub fn analyze<E: MotionEstimator>(
        &self,
        source: &mut dyn FrameSource,
        estimator: E,
    ) -> StabResult<Analysis> {
        self.settings.validate()?;
        let info = source.info().clone();
        if info.frame_count != Some(0) {
            info.size.validate()?;
        }

        let window_frames = self.settings.window_frames(info.fps);
        tracing::info!(
            mode = %self.settings.mode,
            window_secs = self.settings.window_secs,
            window_frames,
            size = %info.size,
            fps = info.fps,
            "Sampling motion"
        );

        self.report(PipelineStage::Sampling, 0, info.frame_count);
        let outcome = MotionSampler::new(estimator)
            .with_missing_policy(self.settings.missing_motion)
            .with_cancel_token(self.cancel.clone())
            .sample_with_progress(gray_frames(source), |n| {
                self.report(PipelineStage::Sampling, n as u64, info.frame_count)
            })?;

        if let Some(reported) = info.frame_count {
            if (outcome.frames() as u64) < reported {
                tracing::warn!(
                    reported,
                    read = outcome.frames(),
                    "Source yielded fewer frames than reported"
                );
            }
        }

        self.cancel.check()?;
        if outcome.frames() > 0 {
            info.size.validate()?;
        }
        let frames = outcome.frames() as u64;
        self.report(PipelineStage::Stabilizing, 0, Some(frames));
        let stabilizer = Stabilizer::new(self.settings.mode, window_frames);
        let target = stabilizer.target(&outcome.trajectory)?;
        let corrections = stabilizer.stabilize(&outcome.trajectory)?;
        let crop_factor = resolve_crop(self.settings.crop, &corrections, info.size)?;
        self.report(PipelineStage::Stabilizing, frames, Some(frames));

        tracing::info!(
            frames,
            missing = outcome.missing_estimates,
            crop_factor,
            "Stabilization computed"
        );

        Ok(Analysis {
            frame_size: info.size,
            source_fps: info.fps,
            window_frames,
            missing_estimates: outcome.missing_estimates,
            crop_factor,
            trajectory: outcome.trajectory,
            target,
            corrections,
        })
    }

    /// Full run. The sink is finished on every exit path.
    pub fn run<E: MotionEstimator>(
        &self,
        source: &mut dyn FrameSource,
        sink: &mut dyn FrameSink,
        estimator: E,
        resampler: &dyn Resampler,
    ) -> StabResult<StabilizeSummary> {
        let result = self.run_passes(source, sink, estimator, resampler);
        self.report(PipelineStage::Finalizing, 0, None);
        let finished = sink.finish();

        match (result, finished) {
            (Ok(summary), Ok(())) => {
                self.report(
                    PipelineStage::Complete,
                    summary.frames_written as u64,
                    Some(summary.frames_written as u64),
                );
                Ok(summary)
            }
            (Ok(_), Err(err)) => Err(err),
            (Err(err), finished) => {
                if let Err(finish_err) = finished {
                    tracing::warn!(error = %finish_err, "Sink failed to finish after error");
                }
                Err(err)
            }
        }
    }

    fn run_passes<E: MotionEstimator>(
        &self,
        source: &mut dyn FrameSource,
        sink: &mut dyn FrameSink,
        estimator: E,
        resampler: &dyn Resampler,
    ) -> StabResult<StabilizeSummary> {
        let analysis = self.analyze(source, estimator)?;

        let total = analysis.corrections.len() as u64;
        self.report(PipelineStage::Rendering, 0, Some(total));
        let frames_written = FrameRenderer::new(resampler)
            .with_cancel_token(self.cancel.clone())
            .render(
                source,
                &analysis.corrections,
                analysis.crop_factor,
                sink,
                analysis.frame_size,
                |n| self.report(PipelineStage::Rendering, n as u64, Some(total)),
            )?;

        Ok(StabilizeSummary::new(analysis, frames_written))
    }
}
