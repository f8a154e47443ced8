//! Emotion module - Behavioral telemetry and emotion scoring.
//!
//! The analyzer is a pure function of telemetry, the resolved cultural
//! profile and the calendar month; it never returns an empty result.

mod analyzer;
mod kind;
mod telemetry;

pub use analyzer::{EmotionAnalyzer, EmotionDetectionResult, EmotionSettings, UNDEFINED_ALIGNMENT};
pub use kind::Emotion;
pub use telemetry::{BehavioralTelemetry, ClickStats, DwellStats, MouseStats, ScrollStats};
