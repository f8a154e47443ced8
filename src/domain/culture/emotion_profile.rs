//! How a culture experiences and responds to a particular emotion.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::domain::emotion::Emotion;
use crate::domain::foundation::UnitInterval;

/// Tone of voice that resonates in a given emotional state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessagingTone {
    Formal,
    #[default]
    Friendly,
    Reassuring,
    Enthusiastic,
    Authoritative,
    Playful,
}

/// How urgency framing ("only 2 left!") lands in a culture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyInterpretation {
    Positive,
    Negative,
    #[default]
    Neutral,
    StressInducing,
    Motivating,
}

impl UrgencyInterpretation {
    /// Whether urgency framing should be softened or removed.
    pub fn discourages_urgency(&self) -> bool {
        matches!(
            self,
            UrgencyInterpretation::Negative | UrgencyInterpretation::StressInducing
        )
    }
}

/// Dominant decision-making pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DecisionPattern {
    #[default]
    Analytical,
    Intuitive,
    SocialProofDriven,
    AuthorityDriven,
}

/// Authored knowledge about one emotion in one culture. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionProfile {
    pub primary_emotion: Emotion,
    #[serde(default)]
    pub secondary_emotions: BTreeSet<Emotion>,
    /// Expected baseline intensity of this emotion in the culture.
    pub intensity: UnitInterval,
    #[serde(default)]
    pub behavioral_triggers: Vec<String>,
    #[serde(default)]
    pub response_patterns: Vec<String>,
    #[serde(default)]
    pub color_associations: Vec<String>,
    #[serde(default)]
    pub messaging_tone: MessagingTone,
    #[serde(default)]
    pub urgency_interpretation: UrgencyInterpretation,
    #[serde(default)]
    pub trust_building_elements: Vec<String>,
    #[serde(default)]
    pub decision_pattern: DecisionPattern,
}

impl EmotionProfile {
    /// Minimal profile for an emotion with the given baseline intensity.
    pub fn baseline(emotion: Emotion, intensity: f64) -> Self {
        Self {
            primary_emotion: emotion,
            secondary_emotions: BTreeSet::new(),
            intensity: UnitInterval::new(intensity),
            behavioral_triggers: Vec::new(),
            response_patterns: Vec::new(),
            color_associations: Vec::new(),
            messaging_tone: MessagingTone::default(),
            urgency_interpretation: UrgencyInterpretation::default(),
            trust_building_elements: Vec::new(),
            decision_pattern: DecisionPattern::default(),
        }
    }

    pub fn with_tone(mut self, tone: MessagingTone) -> Self {
        self.messaging_tone = tone;
        self
    }

    pub fn with_urgency(mut self, urgency: UrgencyInterpretation) -> Self {
        self.urgency_interpretation = urgency;
        self
    }

    pub fn with_colors(mut self, colors: &[&str]) -> Self {
        self.color_associations = colors.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_decision_pattern(mut self, pattern: DecisionPattern) -> Self {
        self.decision_pattern = pattern;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_with_defaults() {
        let yaml = "primary_emotion: trust\nintensity: 0.7\n";
        let profile: EmotionProfile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(profile.primary_emotion, Emotion::Trust);
        assert_eq!(profile.messaging_tone, MessagingTone::Friendly);
        assert!(profile.secondary_emotions.is_empty());
    }

    #[test]
    fn stress_inducing_urgency_is_discouraged() {
        assert!(UrgencyInterpretation::StressInducing.discourages_urgency());
        assert!(!UrgencyInterpretation::Motivating.discourages_urgency());
    }
}
