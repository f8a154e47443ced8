//! Cultural profile aggregate: everything the engine knows about a region.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::emotion_profile::{
    DecisionPattern, EmotionProfile, MessagingTone, UrgencyInterpretation,
};
use crate::domain::emotion::Emotion;
use crate::domain::foundation::{CountryCode, UnitInterval};

/// Preferred communication style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommunicationStyle {
    Direct,
    Indirect,
    HighContext,
    LowContext,
}

/// What a color means in a culture and where it may be used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CulturalColorMapping {
    pub meaning: String,
    pub emotional_response: String,
    #[serde(default)]
    pub allowed_contexts: Vec<String>,
    #[serde(default)]
    pub forbidden_contexts: Vec<String>,
    pub intensity_preference: UnitInterval,
}

impl CulturalColorMapping {
    pub fn is_forbidden_in(&self, context: &str) -> bool {
        self.forbidden_contexts
            .iter()
            .any(|c| c.eq_ignore_ascii_case(context))
    }
}

/// Hofstede's six cultural dimensions, each on a 0-100 scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CulturalDimensions {
    pub power_distance: f64,
    pub individualism: f64,
    pub masculinity: f64,
    pub uncertainty_avoidance: f64,
    pub long_term_orientation: f64,
    pub indulgence: f64,
}

/// Selector for one Hofstede dimension, used by rule conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HofstedeDimension {
    PowerDistance,
    Individualism,
    Masculinity,
    UncertaintyAvoidance,
    LongTermOrientation,
    Indulgence,
}

impl CulturalDimensions {
    pub fn score(&self, dimension: HofstedeDimension) -> f64 {
        match dimension {
            HofstedeDimension::PowerDistance => self.power_distance,
            HofstedeDimension::Individualism => self.individualism,
            HofstedeDimension::Masculinity => self.masculinity,
            HofstedeDimension::UncertaintyAvoidance => self.uncertainty_avoidance,
            HofstedeDimension::LongTermOrientation => self.long_term_orientation,
            HofstedeDimension::Indulgence => self.indulgence,
        }
    }

    fn clamped(self) -> Self {
        let c = |v: f64| if v.is_nan() { 0.0 } else { v.clamp(0.0, 100.0) };
        Self {
            power_distance: c(self.power_distance),
            individualism: c(self.individualism),
            masculinity: c(self.masculinity),
            uncertainty_avoidance: c(self.uncertainty_avoidance),
            long_term_orientation: c(self.long_term_orientation),
            indulgence: c(self.indulgence),
        }
    }
}

impl Default for CulturalDimensions {
    fn default() -> Self {
        Self {
            power_distance: 50.0,
            individualism: 50.0,
            masculinity: 50.0,
            uncertainty_avoidance: 50.0,
            long_term_orientation: 50.0,
            indulgence: 50.0,
        }
    }
}

/// A seasonal period during which emotional baselines shift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalAdjustment {
    pub name: String,
    /// Calendar months (1-12) the adjustment is active in.
    pub months: Vec<u32>,
    #[serde(default)]
    pub emotion_multipliers: BTreeMap<Emotion, f64>,
    #[serde(default)]
    pub messaging_note: Option<String>,
}

impl SeasonalAdjustment {
    pub fn is_active_in(&self, month: u32) -> bool {
        self.months.contains(&month)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TabooSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// Something that must not appear (or should be softened) in a culture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabooElement {
    pub element: String,
    pub severity: TabooSeverity,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub safe_alternatives: Vec<String>,
}

impl TabooElement {
    /// High and critical taboos are enforced; lower ones are advisory.
    pub fn is_enforced(&self) -> bool {
        self.severity >= TabooSeverity::High
    }

    /// Case-insensitive whole-token match against an adapted value.
    pub fn matches(&self, value: &str) -> bool {
        let needle = self.element.to_ascii_lowercase();
        value
            .to_ascii_lowercase()
            .split(|c: char| !c.is_alphanumeric() && c != '#')
            .any(|token| token == needle)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageryStance {
    Preferred,
    Avoid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageryRule {
    pub subject: String,
    pub stance: ImageryStance,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocialProofType {
    Testimonials,
    ExpertEndorsement,
    UserCount,
    Ratings,
    MediaMentions,
    PeerActivity,
}

/// Per-region cultural knowledge. Never mutated on the request path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CulturalProfile {
    pub country_code: CountryCode,
    pub region_name: String,
    pub communication_style: CommunicationStyle,
    #[serde(default)]
    pub emotions: BTreeMap<Emotion, EmotionProfile>,
    #[serde(default)]
    pub colors: BTreeMap<String, CulturalColorMapping>,
    #[serde(default)]
    pub trust_indicators: Vec<String>,
    #[serde(default)]
    pub conversion_triggers: Vec<String>,
    #[serde(default)]
    pub dimensions: CulturalDimensions,
    #[serde(default)]
    pub seasonal_adjustments: Vec<SeasonalAdjustment>,
    #[serde(default)]
    pub taboos: Vec<TabooElement>,
    #[serde(default)]
    pub imagery: Vec<ImageryRule>,
    #[serde(default)]
    pub social_proof: BTreeMap<SocialProofType, UnitInterval>,
}

impl CulturalProfile {
    /// Clamps dimension scores into [0, 100]. Unit-interval fields clamp on
    /// construction already.
    pub fn normalized(mut self) -> Self {
        self.dimensions = self.dimensions.clamped();
        self
    }

    pub fn emotion(&self, emotion: Emotion) -> Option<&EmotionProfile> {
        self.emotions.get(&emotion)
    }

    pub fn references_emotion(&self, emotion: Emotion) -> bool {
        self.emotions.contains_key(&emotion)
    }

    /// Expected intensity per emotion, with any seasonal adjustment active in
    /// `month` applied.
    pub fn emotion_baseline(&self, month: u32) -> BTreeMap<Emotion, f64> {
        let mut baseline: BTreeMap<Emotion, f64> = self
            .emotions
            .iter()
            .map(|(emotion, profile)| (*emotion, profile.intensity.value()))
            .collect();

        for season in self.seasonal_adjustments.iter().filter(|s| s.is_active_in(month)) {
            for (emotion, multiplier) in &season.emotion_multipliers {
                if let Some(value) = baseline.get_mut(emotion) {
                    *value = (*value * multiplier).clamp(0.0, 1.0);
                }
            }
        }

        baseline
    }

    /// First enforced taboo matching the given value.
    pub fn enforced_taboo(&self, value: &str) -> Option<&TabooElement> {
        self.taboos
            .iter()
            .filter(|t| t.is_enforced())
            .find(|t| t.matches(value))
    }

    /// Most effective social proof type; ties resolve to the earliest variant.
    pub fn best_social_proof(&self) -> Option<SocialProofType> {
        self.social_proof
            .iter()
            .fold(None::<(SocialProofType, f64)>, |best, (kind, score)| match best {
                Some((_, top)) if top >= score.value() => best,
                _ => Some((*kind, score.value())),
            })
            .map(|(kind, _)| kind)
    }

    /// Generic low-context profile used whenever a region is unknown.
    pub fn generic(country_code: CountryCode) -> Self {
        let mut emotions = BTreeMap::new();
        emotions.insert(
            Emotion::Trust,
            EmotionProfile::baseline(Emotion::Trust, 0.6)
                .with_tone(MessagingTone::Friendly)
                .with_colors(&["blue"]),
        );
        emotions.insert(
            Emotion::Excitement,
            EmotionProfile::baseline(Emotion::Excitement, 0.6)
                .with_tone(MessagingTone::Enthusiastic)
                .with_urgency(UrgencyInterpretation::Motivating)
                .with_colors(&["orange", "red"]),
        );
        emotions.insert(
            Emotion::Curiosity,
            EmotionProfile::baseline(Emotion::Curiosity, 0.5)
                .with_decision_pattern(DecisionPattern::Intuitive),
        );
        emotions.insert(
            Emotion::Anxiety,
            EmotionProfile::baseline(Emotion::Anxiety, 0.3).with_tone(MessagingTone::Reassuring),
        );
        emotions.insert(Emotion::Calm, EmotionProfile::baseline(Emotion::Calm, 0.4));
        emotions.insert(
            Emotion::Urgency,
            EmotionProfile::baseline(Emotion::Urgency, 0.4)
                .with_urgency(UrgencyInterpretation::Motivating),
        );

        let mut social_proof = BTreeMap::new();
        social_proof.insert(SocialProofType::Ratings, UnitInterval::new(0.8));
        social_proof.insert(SocialProofType::Testimonials, UnitInterval::new(0.7));
        social_proof.insert(SocialProofType::UserCount, UnitInterval::new(0.6));

        Self {
            country_code,
            region_name: "Generic".to_string(),
            communication_style: CommunicationStyle::LowContext,
            emotions,
            colors: BTreeMap::new(),
            trust_indicators: vec!["secure checkout".to_string(), "money-back guarantee".to_string()],
            conversion_triggers: vec!["limited time offer".to_string()],
            dimensions: CulturalDimensions {
                power_distance: 40.0,
                individualism: 91.0,
                masculinity: 62.0,
                uncertainty_avoidance: 46.0,
                long_term_orientation: 26.0,
                indulgence: 68.0,
            },
            seasonal_adjustments: Vec::new(),
            taboos: Vec::new(),
            imagery: Vec::new(),
            social_proof,
        }
    }
}
