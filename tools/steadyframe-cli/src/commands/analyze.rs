//! Estimate motion and corrections without rendering.

use std::path::PathBuf;

use steadyframe_common::config::AppConfig;
use steadyframe_render_engine::{Pipeline, RunReport};

use super::{build_estimator, open_source, resolve_settings};
use crate::StabilizeArgs;

pub fn run(
    config: &AppConfig,
    input: PathBuf,
    stab: StabilizeArgs,
    report: Option<PathBuf>,
    json: bool,
) -> anyhow::Result<()> {
    let settings = resolve_settings(config, &stab, None)?;
    let estimator = build_estimator(&stab)?;
    let feature_region = estimator.config().feature_region;
    let mut source = open_source(&input, stab.input_fps)?;

    let analysis = Pipeline::new(settings.clone())
        .analyze(source.as_mut(), estimator)
        .map_err(|e| anyhow::anyhow!("Analysis failed: {e}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
    } else {
        println!("Analysis of: {}", input.display());
        println!(
            "  Frames: {} ({} without a motion estimate)",
            analysis.frames_sampled(),
            analysis.missing_estimates
        );
        println!("  Size: {} @ {:.3} fps", analysis.frame_size, analysis.source_fps);
        if settings.mode.uses_window() {
            println!(
                "  Mode: {} (window {}s = {} frames)",
                settings.mode, settings.window_secs, analysis.window_frames
            );
        } else {
            println!("  Mode: {}", settings.mode);
        }
        if let Some(region) = feature_region {
            println!("  Feature region: {region}");
        }
        println!("  Crop: {:.2}%", analysis.crop_factor * 100.0);

        let peak = analysis
            .corrections
            .iter()
            .fold((0.0f64, 0.0f64, 0.0f64), |(x, y, a), c| {
                (x.max(c.tx.abs()), y.max(c.ty.abs()), a.max(c.ta.abs()))
            });
        println!(
            "  Peak correction: x {:.2}px, y {:.2}px, angle {:.3}°",
            peak.0,
            peak.1,
            peak.2.to_degrees()
        );
    }

    if let Some(path) = report {
        RunReport::new(&analysis, &settings, &input, None, None).write(&path)?;
        if !json {
            println!("  Report: {}", path.display());
        }
    }

    Ok(())
}
