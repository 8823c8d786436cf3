//! Check external tool availability.

use steadyframe_common::config::config_file_path;
use steadyframe_render_engine::command_exists;

pub fn run() -> anyhow::Result<()> {
    println!("Steadyframe System Check");
    println!("{}", "=".repeat(50));

    let mut all_ok = true;
    for (binary, purpose) in [("ffprobe", "reading video metadata"), ("ffmpeg", "decoding and encoding")] {
        if command_exists(binary) {
            println!("[OK] {binary} found ({purpose})");
        } else {
            all_ok = false;
            println!("[MISSING] {binary} not found in PATH ({purpose})");
        }
    }

    let config_path = config_file_path();
    if config_path.exists() {
        println!("[OK] Config: {}", config_path.display());
    } else {
        println!("[INFO] No config file, using defaults ({})", config_path.display());
    }

    println!();
    if all_ok {
        println!("Video files can be stabilized.");
    } else {
        println!("Install ffmpeg to process video files. Image directories work without it.");
    }

    Ok(())
}
