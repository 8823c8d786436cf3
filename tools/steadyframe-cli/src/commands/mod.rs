//! CLI command implementations.

pub mod analyze;
pub mod check;
pub mod modes;
pub mod stabilize;

use std::path::{Path, PathBuf};

use steadyframe_common::config::AppConfig;
use steadyframe_model::{StabilizationMode, StabilizeSettings};
#[cfg(not(feature = "opencv"))]
use steadyframe_processing_core::{BlockMatchConfig, BlockMatchEstimator};
use steadyframe_processing_core::FeatureRegion;
#[cfg(feature = "opencv")]
use steadyframe_processing_core::{OpticalFlowConfig, OpticalFlowEstimator};
use steadyframe_render_engine::{
    EncodeOptions, FfmpegSink, FfmpegSource, FrameSink, FrameSource, ImageSequenceSink,
    ImageSequenceSource, VideoInfo,
};

use crate::StabilizeArgs;

/// Config-file defaults overridden by whatever flags were given.
pub fn resolve_settings(
    config: &AppConfig,
    args: &StabilizeArgs,
    output_fps: Option<f64>,
) -> anyhow::Result<StabilizeSettings> {
    let mut settings = StabilizeSettings::try_from(&config.stabilization)
        .map_err(|e| anyhow::anyhow!("Invalid stabilization defaults in config: {e}"))?;

    if let Some(mode) = &args.mode {
        settings.mode = mode.parse::<StabilizationMode>()?;
    }
    if let Some(window) = args.window {
        settings.window_secs = window;
    }
    if let Some(crop) = &args.crop {
        settings.crop = crop.parse()?;
    }
    if let Some(policy) = &args.missing_motion {
        settings.missing_motion = policy.parse()?;
    }
    settings.output_fps = output_fps;

    settings.validate()?;
    Ok(settings)
}

/// Parsed `--feature-region`, if given.
pub fn feature_region(args: &StabilizeArgs) -> anyhow::Result<Option<FeatureRegion>> {
    let region = args
        .feature_region
        .as_deref()
        .map(str::parse::<FeatureRegion>)
        .transpose()?;
    Ok(region)
}

/// Built-in block-matching estimator.
#[cfg(not(feature = "opencv"))]
pub fn build_estimator(args: &StabilizeArgs) -> anyhow::Result<BlockMatchEstimator> {
    Ok(BlockMatchEstimator::new(BlockMatchConfig {
        feature_region: feature_region(args)?,
        ..Default::default()
    }))
}

/// OpenCV optical-flow estimator.
#[cfg(feature = "opencv")]
pub fn build_estimator(args: &StabilizeArgs) -> anyhow::Result<OpticalFlowEstimator> {
    Ok(OpticalFlowEstimator::new(OpticalFlowConfig {
        feature_region: feature_region(args)?,
        ..Default::default()
    }))
}

/// A directory is read as an image sequence, anything else through ffmpeg.
pub fn open_source(input: &Path, input_fps: Option<f64>) -> anyhow::Result<Box<dyn FrameSource>> {
    if input.is_dir() {
        let source = ImageSequenceSource::open(input, input_fps)
            .map_err(|e| anyhow::anyhow!("Failed to open image sequence: {e}"))?;
        Ok(Box::new(source))
    } else {
        if input_fps.is_some() {
            tracing::warn!("--input-fps only applies to image sequences; using the rate ffprobe reports");
        }
        let source =
            FfmpegSource::open(input).map_err(|e| anyhow::anyhow!("Failed to open video: {e}"))?;
        Ok(Box::new(source))
    }
}

/// Where rendered frames go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    ImageSequence(PathBuf),
    Video(PathBuf),
}

impl OutputTarget {
    /// Existing directories and extensionless paths become PNG sequences.
    pub fn detect(output: &Path) -> Self {
        if output.is_dir() || output.extension().is_none() {
            OutputTarget::ImageSequence(output.to_path_buf())
        } else {
            OutputTarget::Video(output.to_path_buf())
        }
    }
}

/// Open the sink for `target`. Video output is encoded at the effective
/// output rate; image sequences carry no rate.
pub fn open_sink(
    target: &OutputTarget,
    info: &VideoInfo,
    settings: &StabilizeSettings,
    options: EncodeOptions,
) -> anyhow::Result<Box<dyn FrameSink>> {
    match target {
        OutputTarget::ImageSequence(dir) => {
            if let Some(fps) = settings.output_fps {
                tracing::warn!(fps, "--fps has no effect on image sequence output");
            }
            let sink = ImageSequenceSink::create(dir)
                .map_err(|e| anyhow::anyhow!("Failed to create output directory: {e}"))?;
            Ok(Box::new(sink))
        }
        OutputTarget::Video(path) => {
            let sink = FfmpegSink::create(
                path,
                info.size,
                settings.effective_output_fps(info.fps),
                options,
            )
            .map_err(|e| anyhow::anyhow!("Failed to start encoder: {e}"))?;
            Ok(Box::new(sink))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use steadyframe_model::{CropSetting, FrameSize, MissingMotionPolicy, Rotation};

    #[test]
    fn test_flags_override_config() {
        let args = StabilizeArgs {
            mode: Some("pan-a".to_string()),
            window: Some(4),
            crop: Some("12".to_string()),
            missing_motion: Some("hold-last".to_string()),
            input_fps: None,
            feature_region: None,
        };
        let settings = resolve_settings(&AppConfig::default(), &args, Some(25.0)).unwrap();
        assert_eq!(settings.mode, StabilizationMode::PanA);
        assert_eq!(settings.window_secs, 4);
        assert_eq!(settings.crop, CropSetting::Fixed(12.0));
        assert_eq!(settings.missing_motion, MissingMotionPolicy::HoldLast);
        assert_eq!(settings.output_fps, Some(25.0));
    }

    #[test]
    fn test_config_defaults_apply() {
        let mut config = AppConfig::default();
        config.stabilization.mode = "still".to_string();
        let settings = resolve_settings(&config, &StabilizeArgs::default(), None).unwrap();
        assert_eq!(settings.mode, StabilizationMode::Still);
        assert_eq!(settings.window_secs, 2);
    }

    #[test]
    fn test_bad_flags_are_rejected() {
        let config = AppConfig::default();
        let bad_mode = StabilizeArgs {
            mode: Some("wobble".to_string()),
            ..Default::default()
        };
        assert!(resolve_settings(&config, &bad_mode, None).is_err());

        let bad_window = StabilizeArgs {
            window: Some(0),
            ..Default::default()
        };
        assert!(resolve_settings(&config, &bad_window, None).is_err());

        assert!(resolve_settings(&config, &StabilizeArgs::default(), Some(0.0)).is_err());
    }

    #[test]
    fn test_output_target_detection() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            OutputTarget::detect(dir.path()),
            OutputTarget::ImageSequence(dir.path().to_path_buf())
        );
        assert_eq!(
            OutputTarget::detect(Path::new("frames_out")),
            OutputTarget::ImageSequence(PathBuf::from("frames_out"))
        );
        assert_eq!(
            OutputTarget::detect(Path::new("stable.mp4")),
            OutputTarget::Video(PathBuf::from("stable.mp4"))
        );
    }

    #[test]
    fn test_estimator_uses_feature_region() {
        let args = StabilizeArgs {
            feature_region: Some("16,8,320,240".to_string()),
            ..Default::default()
        };
        let region = Some(FeatureRegion {
            x: 16,
            y: 8,
            width: 320,
            height: 240,
        });
        assert_eq!(feature_region(&args).unwrap(), region);
        assert_eq!(build_estimator(&args).unwrap().config().feature_region, region);

        let plain = build_estimator(&StabilizeArgs::default()).unwrap();
        assert_eq!(plain.config().feature_region, None);

        let bad = StabilizeArgs {
            feature_region: Some("16,8,320".to_string()),
            ..Default::default()
        };
        assert!(build_estimator(&bad).is_err());
    }

    #[test]
    fn test_image_sequence_sink_ignores_output_rate() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("frames");
        let info = VideoInfo {
            size: FrameSize::new(32, 24),
            fps: 30.0,
            frame_count: Some(10),
            rotation: Rotation::default(),
        };
        let settings =
            resolve_settings(&AppConfig::default(), &StabilizeArgs::default(), Some(12.0)).unwrap();

        let mut sink = open_sink(
            &OutputTarget::ImageSequence(out.clone()),
            &info,
            &settings,
            EncodeOptions::default(),
        )
        .unwrap();
        sink.finish().unwrap();
        assert!(out.is_dir());
    }
}
