//! Stabilization modes and their per-axis behavior table.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How a single axis of the trajectory is turned into its target path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisBehavior {
    /// Lock the axis to 0 (remove all motion).
    Zero,
    /// Windowed moving average of the cumulative values.
    Smoothed,
    /// Straight line from the first to the last value (constant-velocity pan).
    Distributed,
    /// Keep the raw values.
    Unmodified,
}

impl AxisBehavior {
    pub fn as_str(self) -> &'static str {
        match self {
            AxisBehavior::Zero => "zero",
            AxisBehavior::Smoothed => "smoothed",
            AxisBehavior::Distributed => "distributed",
            AxisBehavior::Unmodified => "unmodified",
        }
    }
}

/// Per-axis behaviors selected by a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisPlan {
    pub x: AxisBehavior,
    pub y: AxisBehavior,
    pub angle: AxisBehavior,
}

/// Named stabilization policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StabilizationMode {
    /// Smooth every axis.
    #[default]
    Generic,
    /// Smooth translation, remove rotation.
    GenericA,
    /// Tripod shot: remove all motion.
    Still,
    /// Horizontal pan.
    HPan,
    /// Horizontal pan with smoothed rotation.
    HPanA,
    /// Vertical pan.
    VPan,
    /// Vertical pan with smoothed rotation.
    VPanA,
    /// Diagonal pan.
    Pan,
    /// Diagonal pan with smoothed rotation.
    PanA,
    /// Only remove rotation.
    NoRotation,
}

use AxisBehavior::{Distributed as D, Smoothed as S, Unmodified as U, Zero as Z};

const fn plan(x: AxisBehavior, y: AxisBehavior, angle: AxisBehavior) -> AxisPlan {
    AxisPlan { x, y, angle }
}

/// Mode table, indexed in the order of [`StabilizationMode::ALL`].
static MODE_TABLE: [(StabilizationMode, &str, AxisPlan); 10] = [
    (StabilizationMode::Generic, "generic", plan(S, S, S)),
    (StabilizationMode::GenericA, "generic-a", plan(S, S, Z)),
    (StabilizationMode::Still, "still", plan(Z, Z, Z)),
    (StabilizationMode::HPan, "h-pan", plan(D, Z, Z)),
    (StabilizationMode::HPanA, "h-pan-a", plan(D, Z, S)),
    (StabilizationMode::VPan, "v-pan", plan(Z, D, Z)),
    (StabilizationMode::VPanA, "v-pan-a", plan(Z, D, S)),
    (StabilizationMode::Pan, "pan", plan(D, D, Z)),
    (StabilizationMode::PanA, "pan-a", plan(D, D, S)),
    (StabilizationMode::NoRotation, "no-rotation", plan(U, U, Z)),
];

impl StabilizationMode {
    pub const ALL: [StabilizationMode; 10] = [
        StabilizationMode::Generic,
        StabilizationMode::GenericA,
        StabilizationMode::Still,
        StabilizationMode::HPan,
        StabilizationMode::HPanA,
        StabilizationMode::VPan,
        StabilizationMode::VPanA,
        StabilizationMode::Pan,
        StabilizationMode::PanA,
        StabilizationMode::NoRotation,
    ];

    fn entry(self) -> &'static (StabilizationMode, &'static str, AxisPlan) {
        &MODE_TABLE[self as usize]
    }

    /// The per-axis behaviors of this mode.
    pub fn axes(self) -> AxisPlan {
        self.entry().2
    }

    /// Command-line / config name.
    pub fn as_str(self) -> &'static str {
        self.entry().1
    }

    /// Whether any axis uses the moving average (and so depends on the window).
    pub fn uses_window(self) -> bool {
        let axes = self.axes();
        [axes.x, axes.y, axes.angle].contains(&AxisBehavior::Smoothed)
    }
}

impl fmt::Display for StabilizationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a mode name is not in the table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown stabilization mode `{0}` (expected one of: generic, generic-a, still, h-pan, h-pan-a, v-pan, v-pan-a, pan, pan-a, no-rotation)")]
pub struct UnknownModeError(pub String);

impl FromStr for StabilizationMode {
    type Err = UnknownModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        MODE_TABLE
            .iter()
            .find(|(_, name, _)| *name == wanted)
            .map(|(mode, _, _)| *mode)
            .ok_or_else(|| UnknownModeError(s.to_string()))
    }
}
