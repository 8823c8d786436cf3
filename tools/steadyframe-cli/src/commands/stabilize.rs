//! Stabilize a video or image sequence.

use std::io::Write;
use std::path::PathBuf;

use steadyframe_common::config::AppConfig;
use steadyframe_render_engine::{
    default_report_path, EncodeOptions, ImageprocResampler, OutputCodec, Pipeline,
    PipelineProgress, PipelineStage, RunReport,
};

use super::{build_estimator, open_sink, open_source, resolve_settings, OutputTarget};
use crate::StabilizeArgs;

/// Arguments of `steadyframe stabilize`.
pub struct StabilizeJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub stab: StabilizeArgs,
    pub fps: Option<f64>,
    pub codec: Option<String>,
    pub crf: Option<u32>,
    pub report: bool,
    pub report_path: Option<PathBuf>,
}

/// Codec and CRF from flags, falling back to the config file.
pub fn encode_options(
    config: &AppConfig,
    codec: Option<&str>,
    crf: Option<u32>,
) -> anyhow::Result<EncodeOptions> {
    let codec: OutputCodec = codec.unwrap_or(&config.encoding.codec).parse()?;
    let crf = crf.unwrap_or(config.encoding.crf);
    let crf = u8::try_from(crf)
        .ok()
        .filter(|c| *c <= 51)
        .ok_or_else(|| anyhow::anyhow!("CRF must be between 0 and 51, got {crf}"))?;
    Ok(EncodeOptions { codec, crf })
}

pub fn run(config: &AppConfig, job: StabilizeJob) -> anyhow::Result<()> {
    let settings = resolve_settings(config, &job.stab, job.fps)?;
    let options = encode_options(config, job.codec.as_deref(), job.crf)?;
    let estimator = build_estimator(&job.stab)?;

    println!("Stabilizing: {}", job.input.display());
    let mut source = open_source(&job.input, job.stab.input_fps)?;
    let info = source.info().clone();
    if info.frame_count == Some(0) {
        println!("No frames in input; nothing to stabilize.");
        return Ok(());
    }

    let target = OutputTarget::detect(&job.output);
    let mut sink = open_sink(&target, &info, &settings, options)?;

    println!("  Output: {}", job.output.display());
    if settings.mode.uses_window() {
        println!("  Mode: {} (window {}s)", settings.mode, settings.window_secs);
    } else {
        println!("  Mode: {}", settings.mode);
    }
    if let Some(region) = estimator.config().feature_region {
        println!("  Feature region: {region}");
    }
    println!("  Input: {} @ {:.3} fps", info.size, info.fps);
    if let OutputTarget::Video(_) = target {
        println!("  Codec: {} (crf {})", options.codec, options.crf);
    }

    let pipeline = Pipeline::new(settings.clone()).with_progress(Box::new(print_progress));
    let resampler = ImageprocResampler::default();

    let summary = match pipeline.run(source.as_mut(), sink.as_mut(), estimator, &resampler) {
        Ok(summary) => summary,
        Err(e) => {
            println!();
            return Err(anyhow::anyhow!("Stabilization failed: {e}"));
        }
    };

    println!();
    println!(
        "Stabilization complete: {} frames written ({} sampled, {} without a motion estimate)",
        summary.frames_written, summary.frames_sampled, summary.missing_estimates
    );
    println!("  Crop: {:.2}%", summary.crop_factor * 100.0);

    let report_path = match (job.report_path, job.report) {
        (Some(path), _) => Some(path),
        (None, true) => Some(default_report_path(&job.output)),
        (None, false) => None,
    };
    if let Some(path) = report_path {
        RunReport::new(
            &summary.analysis(),
            &settings,
            &job.input,
            Some(&job.output),
            Some(summary.frames_written),
        )
        .write(&path)?;
        println!("  Report: {}", path.display());
    }

    Ok(())
}

fn print_progress(p: PipelineProgress) {
    let _ = write_progress(&mut std::io::stdout().lock(), &p);
}

/// One carriage-return progress line, flushed so it shows before the newline.
fn write_progress(out: &mut impl Write, p: &PipelineProgress) -> std::io::Result<()> {
    let label = match p.stage {
        PipelineStage::Sampling => "Sampling motion",
        PipelineStage::Stabilizing => "Stabilizing",
        PipelineStage::Rendering => "Rendering",
        PipelineStage::Finalizing | PipelineStage::Complete => return Ok(()),
    };
    match p.total_frames {
        Some(total) if total > 0 => write!(
            out,
            "\r  {label}: {:.1}% ({}/{} frames)  ",
            p.frames_done as f64 / total as f64 * 100.0,
            p.frames_done,
            total
        )?,
        _ => write!(out, "\r  {label}: {} frames  ", p.frames_done)?,
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_options_defaults_from_config() {
        let options = encode_options(&AppConfig::default(), None, None).unwrap();
        assert_eq!(options, EncodeOptions::default());
    }

    #[test]
    fn test_encode_options_flags() {
        let options = encode_options(&AppConfig::default(), Some("hevc"), Some(28)).unwrap();
        assert_eq!(options.codec, OutputCodec::H265);
        assert_eq!(options.crf, 28);
    }

    #[test]
    fn test_encode_options_rejects_bad_values() {
        let config = AppConfig::default();
        assert!(encode_options(&config, Some("vp9"), None).is_err());
        assert!(encode_options(&config, None, Some(52)).is_err());
        assert!(encode_options(&config, None, Some(300)).is_err());
    }

    #[test]
    fn test_empty_input_directory_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("frames");
        std::fs::create_dir(&input).unwrap();
        let output = dir.path().join("steady");

        let job = StabilizeJob {
            input,
            output: output.clone(),
            stab: StabilizeArgs::default(),
            fps: None,
            codec: None,
            crf: None,
            report: false,
            report_path: None,
        };
        run(&AppConfig::default(), job).unwrap();
        assert!(!output.exists());
    }

    #[derive(Default)]
    struct RecordingWriter {
        text: Vec<u8>,
        flushes: usize,
    }

    impl Write for RecordingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.text.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushes += 1;
            Ok(())
        }
    }

    #[test]
    fn test_progress_line_is_flushed() {
        let mut out = RecordingWriter::default();
        let progress = PipelineProgress {
            stage: PipelineStage::Rendering,
            frames_done: 5,
            total_frames: Some(20),
        };
        write_progress(&mut out, &progress).unwrap();
        assert_eq!(out.flushes, 1);
        assert_eq!(
            String::from_utf8(out.text).unwrap(),
            "\r  Rendering: 25.0% (5/20 frames)  "
        );
    }

    #[test]
    fn test_final_stages_print_nothing() {
        let mut out = RecordingWriter::default();
        let progress = PipelineProgress {
            stage: PipelineStage::Complete,
            frames_done: 0,
            total_frames: None,
        };
        write_progress(&mut out, &progress).unwrap();
        assert!(out.text.is_empty());
        assert_eq!(out.flushes, 0);
    }
}
