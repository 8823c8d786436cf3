//! Steadyframe CLI: command-line interface for video stabilization.
//!
//! Usage:
//!   steadyframe stabilize <INPUT> <OUTPUT>   Stabilize a video or image sequence
//!   steadyframe analyze <INPUT>              Estimate motion and corrections only
//!   steadyframe modes                        List stabilization modes
//!   steadyframe check                        Check ffmpeg availability

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use steadyframe_common::config::{AppConfig, LoggingConfig};

mod commands;

#[derive(Parser)]
#[command(
    name = "steadyframe",
    about = "Two-pass video stabilization with per-axis smoothing modes",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Stabilization flags shared by `stabilize` and `analyze`. Omitted flags
/// fall back to the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct StabilizeArgs {
    /// Stabilization mode (see `steadyframe modes`)
    #[arg(short, long)]
    pub mode: Option<String>,

    /// Smoothing window in seconds (1-4)
    #[arg(short, long)]
    pub window: Option<u32>,

    /// Crop: "auto" or a fixed percentage (0-40)
    #[arg(long)]
    pub crop: Option<String>,

    /// Missing motion estimates: zero | hold-last
    #[arg(long)]
    pub missing_motion: Option<String>,

    /// Frame rate of an image-sequence input
    #[arg(long)]
    pub input_fps: Option<f64>,

    /// Track motion only inside x,y,width,height (pixels of the input frame)
    #[arg(long)]
    pub feature_region: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Stabilize a video file or image directory
    Stabilize {
        /// Input video file or directory of images
        input: PathBuf,

        /// Output video file, or a directory for a PNG sequence
        output: PathBuf,

        #[command(flatten)]
        stab: StabilizeArgs,

        /// Output frame rate (defaults to the input rate)
        #[arg(long)]
        fps: Option<f64>,

        /// Output codec: h264 | h265 | mjpeg
        #[arg(long)]
        codec: Option<String>,

        /// Constant rate factor for h264/h265
        #[arg(long)]
        crf: Option<u32>,

        /// Write a JSON run report next to the output
        #[arg(long)]
        report: bool,

        /// Write the JSON run report to this path
        #[arg(long)]
        report_path: Option<PathBuf>,
    },

    /// Sample motion and compute corrections without rendering
    Analyze {
        /// Input video file or directory of images
        input: PathBuf,

        #[command(flatten)]
        stab: StabilizeArgs,

        /// Write the JSON run report to this path
        #[arg(long)]
        report: Option<PathBuf>,

        /// Print the analysis as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// List stabilization modes and their per-axis behavior
    Modes,

    /// Check that ffmpeg and ffprobe are available
    Check,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load();

    steadyframe_common::logging::init_logging(&logging_config(&config.logging, cli.verbose));

    match cli.command {
        Commands::Stabilize {
            input,
            output,
            stab,
            fps,
            codec,
            crf,
            report,
            report_path,
        } => commands::stabilize::run(
            &config,
            commands::stabilize::StabilizeJob {
                input,
                output,
                stab,
                fps,
                codec,
                crf,
                report,
                report_path,
            },
        ),
        Commands::Analyze {
            input,
            stab,
            report,
            json,
        } => commands::analyze::run(&config, input, stab, report, json),
        Commands::Modes => commands::modes::run(),
        Commands::Check => commands::check::run(),
    }
}

/// `--verbose` forces debug logging; otherwise the configured level stands.
fn logging_config(config: &LoggingConfig, verbose: bool) -> LoggingConfig {
    if verbose {
        LoggingConfig {
            level: "debug".to_string(),
            ..config.clone()
        }
    } else {
        config.clone()
    }
}
