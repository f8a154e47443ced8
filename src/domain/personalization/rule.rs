//! Personalization rules authored outside the engine and consumed read-only.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::adaptation::UXAdaptation;
use super::condition::{Condition, RuleContext};
use crate::domain::culture::CulturalProfile;
use crate::domain::emotion::Emotion;
use crate::domain::foundation::{
    CountryCode, DomainError, ErrorCode, ExperimentId, RuleId, UnitInterval,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    Layout,
    Content,
    Color,
    Cta,
    Messaging,
    Urgency,
    SocialProof,
}

/// Rollout phase of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestingPhase {
    /// Served only to sessions bucketed into the bound experiment variant.
    Testing,
    /// Served only where staging rules are enabled.
    Staging,
    /// Served whenever conditions match.
    Production,
}

/// Experiment variant a testing-phase rule is tied to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariantBinding {
    pub experiment_id: ExperimentId,
    pub variant: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalizationRule {
    pub id: RuleId,
    pub name: String,
    /// Empty means every country.
    #[serde(default)]
    pub target_countries: BTreeSet<CountryCode>,
    /// Empty means any (or no) emotion.
    #[serde(default)]
    pub target_emotions: BTreeSet<Emotion>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    pub adaptations: Vec<UXAdaptation>,
    pub priority: i32,
    pub rule_type: RuleType,
    pub expected_impact: UnitInterval,
    pub confidence: UnitInterval,
    pub phase: TestingPhase,
    #[serde(default)]
    pub experiment: Option<VariantBinding>,
}

impl PersonalizationRule {
    /// Structural validation performed at authoring/load time.
    pub fn validate(&self) -> Result<(), DomainError> {
        let invalid = |msg: String| {
            DomainError::new(ErrorCode::InvalidRuleConfig, msg).with_detail("rule_id", self.id.as_str())
        };

        if self.name.trim().is_empty() {
            return Err(invalid("rule name cannot be empty".to_string()));
        }
        if self.adaptations.is_empty() {
            return Err(invalid("rule must declare at least one adaptation".to_string()));
        }
        if let Some(blank) = self.adaptations.iter().find(|a| a.target_selector.trim().is_empty()) {
            return Err(invalid(format!(
                "adaptation of type {:?} has an empty target selector",
                blank.element_type
            )));
        }
        for condition in &self.conditions {
            condition
                .validate()
                .map_err(|e| invalid(format!("malformed condition: {}", e)))?;
        }
        match (self.phase, &self.experiment) {
            (TestingPhase::Testing, None) => {
                return Err(invalid("testing-phase rule must be bound to an experiment variant".to_string()))
            }
            (TestingPhase::Testing, Some(binding)) if binding.variant.trim().is_empty() => {
                return Err(invalid("experiment binding has an empty variant name".to_string()))
            }
            _ => {}
        }
        Ok(())
    }

    /// Every emotion this rule references must exist in each targeted
    /// profile's emotion map.
    pub fn validate_against_profile(&self, profile: &CulturalProfile) -> Result<(), DomainError> {
        let referenced = self
            .target_emotions
            .iter()
            .copied()
            .chain(self.conditions.iter().flat_map(|c| c.referenced_emotions()));

        for emotion in referenced {
            if emotion != Emotion::Neutral && !profile.references_emotion(emotion) {
                return Err(DomainError::new(
                    ErrorCode::InvalidRuleConfig,
                    format!(
                        "rule references emotion '{}' missing from profile {}",
                        emotion, profile.country_code
                    ),
                )
                .with_detail("rule_id", self.id.as_str()));
            }
        }
        Ok(())
    }

    pub fn targets_country(&self, country: &CountryCode) -> bool {
        self.target_countries.is_empty() || self.target_countries.contains(country)
    }

    pub fn targets_emotion(&self, emotion: Option<Emotion>) -> bool {
        if self.target_emotions.is_empty() {
            return true;
        }
        emotion.is_some_and(|e| self.target_emotions.contains(&e))
    }

    /// Targeting and every condition match.
    pub fn matches(&self, ctx: &RuleContext<'_>) -> bool {
        self.targets_country(ctx.country_code)
            && self.targets_emotion(ctx.dominant_emotion())
            && self.conditions.iter().all(|c| c.evaluate(ctx))
    }
}
