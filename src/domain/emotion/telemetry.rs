//! Behavioral telemetry buckets supplied by the session collaborator.

use serde::{Deserialize, Serialize};

/// Aggregated pointer movement over the observation window.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MouseStats {
    pub avg_velocity_px_s: f64,
    pub direction_changes_per_s: f64,
    /// Fraction of the window with no pointer movement (0-1).
    pub idle_ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScrollStats {
    pub avg_speed_px_s: f64,
    /// Deepest scroll position reached, as a fraction of the page (0-1).
    pub max_depth: f64,
    pub reversals: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DwellStats {
    pub total_secs: f64,
    pub avg_section_secs: f64,
    pub revisits: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ClickStats {
    pub clicks_per_min: f64,
    pub rage_clicks: u32,
    pub dead_clicks: u32,
    pub cta_clicks: u32,
}

/// Whatever telemetry buckets were captured for a session. Any may be absent.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BehavioralTelemetry {
    #[serde(default)]
    pub mouse: Option<MouseStats>,
    #[serde(default)]
    pub scroll: Option<ScrollStats>,
    #[serde(default)]
    pub dwell: Option<DwellStats>,
    #[serde(default)]
    pub clicks: Option<ClickStats>,
}

impl BehavioralTelemetry {
    pub const BUCKETS: usize = 4;

    /// Number of buckets present.
    pub fn bucket_count(&self) -> usize {
        [
            self.mouse.is_some(),
            self.scroll.is_some(),
            self.dwell.is_some(),
            self.clicks.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }

    pub fn is_empty(&self) -> bool {
        self.bucket_count() == 0
    }
}
