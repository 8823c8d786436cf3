//! JSON run report.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use steadyframe_common::error::StabResult;
use steadyframe_model::{FrameSize, StabilizeSettings};

use crate::pipeline::Analysis;

/// Per-frame values as `(x, y, angle)`.
#[derive(Debug, Clone, Serialize)]
pub struct FrameRecord {
    pub index: usize,
    pub raw: [f64; 3],
    pub target: [f64; 3],
    pub correction: [f64; 3],
}

/// Everything needed to inspect a run afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub input: String,
    pub output: Option<String>,
    pub mode: String,
    pub window_secs: u32,
    pub window_frames: usize,
    pub source_fps: f64,
    pub frame_size: FrameSize,
    pub crop_factor: f64,
    pub frames_sampled: usize,
    pub frames_written: Option<usize>,
    pub missing_estimates: usize,
    pub frames: Vec<FrameRecord>,
}

impl RunReport {
    pub fn new(
        analysis: &Analysis,
        settings: &StabilizeSettings,
        input: &Path,
        output: Option<&Path>,
        frames_written: Option<usize>,
    ) -> Self {
        let frames = analysis
            .corrections
            .iter()
            .enumerate()
            .filter_map(|(index, c)| {
                let (x, y, a) = analysis.trajectory.get(index)?;
                let (tx, ty, ta) = analysis.target.get(index)?;
                Some(FrameRecord {
                    index,
                    raw: [x, y, a],
                    target: [tx, ty, ta],
                    correction: [c.tx, c.ty, c.ta],
                })
            })
            .collect();

        Self {
            generated_at: Utc::now(),
            input: input.display().to_string(),
            output: output.map(|p| p.display().to_string()),
            mode: settings.mode.to_string(),
            window_secs: settings.window_secs,
            window_frames: analysis.window_frames,
            source_fps: analysis.source_fps,
            frame_size: analysis.frame_size,
            crop_factor: analysis.crop_factor,
            frames_sampled: analysis.frames_sampled(),
            frames_written,
            missing_estimates: analysis.missing_estimates,
            frames,
        }
    }

    /// Write as pretty JSON.
    pub fn write(&self, path: &Path) -> StabResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        tracing::info!(report = %path.display(), "Wrote run report");
        Ok(())
    }
}

/// Default report location next to an output file or inside an output directory.
pub fn default_report_path(output: &Path) -> PathBuf {
    if output.is_dir() || output.extension().is_none() {
        output.join("stabilization.json")
    } else {
        output.with_extension("stabilization.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use steadyframe_model::{Corrections, Trajectory};

    fn analysis() -> Analysis {
        Analysis {
            frame_size: FrameSize::new(64, 48),
            source_fps: 30.0,
            window_frames: 60,
            missing_estimates: 1,
            crop_factor: 0.05,
            trajectory: Trajectory::from_axes(vec![0.0, 2.0], vec![0.0, 1.0], vec![0.0, 0.1]).unwrap(),
            target: Trajectory::from_axes(vec![1.0, 1.0], vec![0.5, 0.5], vec![0.05, 0.05]).unwrap(),
            corrections: Corrections::from_axes(vec![1.0, -1.0], vec![0.5, -0.5], vec![0.05, -0.05])
                .unwrap(),
        }
    }

    #[test]
    fn test_report_serializes_frames() {
        let report = RunReport::new(
            &analysis(),
            &StabilizeSettings::default(),
            Path::new("in.mp4"),
            Some(Path::new("out.mp4")),
            Some(2),
        );
        let json: serde_json::Value = serde_json::to_value(&report).unwrap();
        assert_eq!(json["mode"], "generic");
        assert_eq!(json["frames"].as_array().unwrap().len(), 2);
        assert_eq!(json["frames"][1]["correction"][0], -1.0);
        assert_eq!(json["frame_size"]["width"], 64);
        assert!(json["generated_at"].is_string());
    }

    #[test]
    fn test_write_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("run.json");
        RunReport::new(&analysis(), &StabilizeSettings::default(), Path::new("in"), None, None)
            .write(&path)
            .unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"missing_estimates\": 1"));
    }

    #[test]
    fn test_default_report_path() {
        assert_eq!(
            default_report_path(Path::new("/tmp/out.mp4")),
            PathBuf::from("/tmp/out.stabilization.json")
        );
        assert_eq!(
            default_report_path(Path::new("/tmp/frames_out")),
            PathBuf::from("/tmp/frames_out/stabilization.json")
        );
    }
}
