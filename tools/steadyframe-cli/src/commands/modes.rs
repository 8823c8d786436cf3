//! List stabilization modes.

use steadyframe_model::StabilizationMode;

pub fn run() -> anyhow::Result<()> {
    println!(
        "{:<12} {:<12} {:<12} {:<12} {}",
        "MODE", "X", "Y", "ANGLE", "WINDOW"
    );
    for mode in StabilizationMode::ALL {
        let axes = mode.axes();
        println!(
            "{:<12} {:<12} {:<12} {:<12} {}",
            mode.as_str(),
            axes.x.as_str(),
            axes.y.as_str(),
            axes.angle.as_str(),
            if mode.uses_window() { "yes" } else { "no" }
        );
    }
    println!();
    println!("zero: motion removed, smoothed: moving average over the window,");
    println!("distributed: spread evenly from first to last frame, unmodified: kept as shot.");
    println!("WINDOW: whether --window changes the result.");
    Ok(())
}
