//! Emotion scoring from behavioral telemetry.
//!
//! Each telemetry bucket contributes weighted, saturating features to a
//! subset of emotions. Scores are scaled by a per-country intensity
//! modifier and clamped to [0, 1]. Cultural alignment is the cosine
//! similarity between the score vector and the profile's (seasonally
//! adjusted) baseline.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::kind::Emotion;
use super::telemetry::BehavioralTelemetry;
use crate::domain::culture::CulturalProfile;
use crate::domain::foundation::CountryCode;

const ZERO_EPSILON: f64 = 1e-9;

/// Alignment reported when either vector carries no signal.
pub const UNDEFINED_ALIGNMENT: f64 = 0.5;

/// Tunables for the analyzer.
#[derive(Debug, Clone, PartialEq)]
pub struct EmotionSettings {
    /// Multiplier applied to every score for visitors from a country.
    pub intensity_modifiers: HashMap<CountryCode, f64>,
    pub neutral_intensity: f64,
    pub neutral_confidence: f64,
}

impl Default for EmotionSettings {
    fn default() -> Self {
        let mut intensity_modifiers = HashMap::new();
        if let Ok(us) = CountryCode::new("US") {
            intensity_modifiers.insert(us, 1.1);
        }
        if let Ok(jp) = CountryCode::new("JP") {
            intensity_modifiers.insert(jp, 0.8);
        }
        Self {
            intensity_modifiers,
            neutral_intensity: 0.5,
            neutral_confidence: 0.3,
        }
    }
}

/// Output of emotion analysis. Always carries a dominant emotion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionDetectionResult {
    pub scores: BTreeMap<Emotion, f64>,
    pub dominant: Emotion,
    pub intensity: f64,
    pub cultural_alignment: f64,
    pub confidence: f64,
}

impl EmotionDetectionResult {
    /// Result used when no behavioral evidence is available.
    pub fn neutral(settings: &EmotionSettings) -> Self {
        Self {
            scores: Emotion::SCORED.iter().map(|e| (*e, 0.0)).collect(),
            dominant: Emotion::Neutral,
            intensity: settings.neutral_intensity,
            cultural_alignment: UNDEFINED_ALIGNMENT,
            confidence: settings.neutral_confidence,
        }
    }
}

/// Saturating normalization of a raw measurement against a cap.
fn sat(value: f64, cap: f64) -> f64 {
    if value.is_nan() || cap <= 0.0 {
        return 0.0;
    }
    (value / cap).clamp(0.0, 1.0)
}

/// Converts telemetry into an emotion result.
#[derive(Debug, Clone)]
pub struct EmotionAnalyzer {
    settings: EmotionSettings,
}

impl EmotionAnalyzer {
    pub fn new(settings: EmotionSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &EmotionSettings {
        &self.settings
    }

    /// Analyzes telemetry for a visitor resolved to `profile`, using the
    /// profile's baseline for `month` (1-12).
    pub fn analyze(
        &self,
        telemetry: &BehavioralTelemetry,
        profile: &CulturalProfile,
        month: u32,
    ) -> EmotionDetectionResult {
        let raw = Self::raw_scores(telemetry);
        let modifier = self
            .settings
            .intensity_modifiers
            .get(&profile.country_code)
            .copied()
            .unwrap_or(1.0);

        let scores: BTreeMap<Emotion, f64> = raw
            .into_iter()
            .map(|(emotion, score)| (emotion, (score * modifier).clamp(0.0, 1.0)))
            .collect();

        if scores.values().all(|s| *s <= ZERO_EPSILON) {
            return EmotionDetectionResult::neutral(&self.settings);
        }

        // Ties resolve to the first emotion in SCORED order.
        let (dominant, intensity) = Emotion::SCORED.iter().fold(
            (Emotion::Neutral, 0.0_f64),
            |(best, top), emotion| {
                let score = scores.get(emotion).copied().unwrap_or(0.0);
                if score > top + ZERO_EPSILON {
                    (*emotion, score)
                } else {
                    (best, top)
                }
            },
        );

        let baseline = profile.emotion_baseline(month);
        let coverage = telemetry.bucket_count() as f64 / BehavioralTelemetry::BUCKETS as f64;
        let neutral = self.settings.neutral_confidence;

        EmotionDetectionResult {
            cultural_alignment: Self::alignment(&scores, &baseline),
            scores,
            dominant,
            intensity,
            confidence: (neutral + (1.0 - neutral) * coverage).min(1.0),
        }
    }

    fn raw_scores(telemetry: &BehavioralTelemetry) -> BTreeMap<Emotion, f64> {
        let mut scores: BTreeMap<Emotion, f64> =
            Emotion::SCORED.iter().map(|e| (*e, 0.0)).collect();
        let mut add = |emotion: Emotion, value: f64| {
            if let Some(score) = scores.get_mut(&emotion) {
                *score += value;
            }
        };

        if let Some(mouse) = telemetry.mouse {
            add(Emotion::Excitement, 0.4 * sat(mouse.avg_velocity_px_s, 1500.0));
            add(Emotion::Anxiety, 0.5 * sat(mouse.direction_changes_per_s, 8.0));
            add(Emotion::Frustration, 0.2 * sat(mouse.direction_changes_per_s, 12.0));
            add(Emotion::Calm, 0.6 * sat(mouse.idle_ratio, 1.0));
        }

        if let Some(scroll) = telemetry.scroll {
            add(Emotion::Excitement, 0.3 * sat(scroll.avg_speed_px_s, 3000.0));
            add(Emotion::Anxiety, 0.3 * sat(f64::from(scroll.reversals), 10.0));
            add(Emotion::Curiosity, 0.5 * sat(scroll.max_depth, 1.0));
            add(Emotion::Calm, 0.4 * (1.0 - sat(scroll.avg_speed_px_s, 3000.0)));
            add(Emotion::Urgency, 0.3 * sat(scroll.avg_speed_px_s, 4000.0));
        }

        if let Some(dwell) = telemetry.dwell {
            add(Emotion::Anxiety, 0.2 * sat(f64::from(dwell.revisits), 6.0));
            add(Emotion::Curiosity, 0.3 * sat(dwell.avg_section_secs, 20.0));
            add(Emotion::Trust, 0.5 * sat(dwell.total_secs, 180.0));
            if dwell.total_secs > 0.0 {
                add(Emotion::Urgency, 0.2 * (1.0 - sat(dwell.avg_section_secs, 20.0)));
            }
        }

        if let Some(clicks) = telemetry.clicks {
            add(Emotion::Excitement, 0.3 * sat(clicks.clicks_per_min, 30.0));
            add(Emotion::Frustration, 0.6 * sat(f64::from(clicks.rage_clicks), 5.0));
            add(Emotion::Frustration, 0.2 * sat(f64::from(clicks.dead_clicks), 5.0));
            add(Emotion::Curiosity, 0.2 * sat(clicks.clicks_per_min, 15.0));
            add(Emotion::Trust, 0.5 * sat(f64::from(clicks.cta_clicks), 3.0));
            add(Emotion::Urgency, 0.5 * sat(clicks.clicks_per_min, 40.0));
        }

        scores
    }

    /// Cosine similarity over the scored emotions; both vectors are
    /// non-negative so the result lies in [0, 1].
    fn alignment(scores: &BTreeMap<Emotion, f64>, baseline: &BTreeMap<Emotion, f64>) -> f64 {
        let mut dot = 0.0;
        let mut norm_scores = 0.0;
        let mut norm_baseline = 0.0;
        for emotion in Emotion::SCORED {
            let s = scores.get(&emotion).copied().unwrap_or(0.0);
            let b = baseline.get(&emotion).copied().unwrap_or(0.0);
            dot += s * b;
            norm_scores += s * s;
            norm_baseline += b * b;
        }
        if norm_scores <= ZERO_EPSILON || norm_baseline <= ZERO_EPSILON {
            return UNDEFINED_ALIGNMENT;
        }
        (dot / (norm_scores.sqrt() * norm_baseline.sqrt())).clamp(0.0, 1.0)
    }
}

impl Default for EmotionAnalyzer {
    fn default() -> Self {
        Self::new(EmotionSettings::default())
    }
}
