//! Batch aggregation over the event log.
//!
//! Events are folded per session first. A session counts as converted when
//! any of its feedback reports a conversion; rule and experiment outcomes
//! only count sessions that left feedback.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::event::{AnalyticsEvent, EventPayload};
use crate::domain::emotion::Emotion;
use crate::domain::experiment::{ExperimentResults, VariantResult};
use crate::domain::foundation::{CountryCode, ExperimentId, RuleId, SessionId, Timestamp};
use crate::domain::personalization::PersonalizationRule;

/// Bounds for confidence adjustment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdjustmentSettings {
    /// Sessions with feedback a rule needs before it is adjusted.
    pub min_samples: u64,
    /// Largest relative change per run, e.g. 0.2 for +/-20%.
    pub max_step: f64,
    pub min_confidence: f64,
    pub max_confidence: f64,
}

impl Default for AdjustmentSettings {
    fn default() -> Self {
        Self {
            min_samples: 20,
            max_step: 0.2,
            min_confidence: 0.1,
            max_confidence: 1.0,
        }
    }
}

/// Outcome statistics for one (country, emotion) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CultureStats {
    pub country_code: CountryCode,
    pub emotion: Emotion,
    pub sessions: u64,
    pub adaptations: u64,
    pub conversions: u64,
    pub conversion_rate: f64,
    pub mean_satisfaction: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleAdjustment {
    pub rule_id: RuleId,
    pub samples: u64,
    pub observed_rate: f64,
    pub expected_impact: f64,
    /// Authored confidence the adjustment starts from.
    pub base_confidence: f64,
    pub adjusted_confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AggregationReport {
    pub culture_stats: Vec<CultureStats>,
    pub rule_adjustments: Vec<RuleAdjustment>,
    pub experiment_results: BTreeMap<ExperimentId, ExperimentResults>,
}

#[derive(Default)]
struct SessionFold {
    country: Option<CountryCode>,
    emotion: Option<Emotion>,
    adaptations: u64,
    rules: BTreeSet<RuleId>,
    variants: BTreeMap<ExperimentId, String>,
    has_feedback: bool,
    converted: bool,
    ratings: Vec<u8>,
}

#[derive(Default)]
struct Tally {
    sessions: u64,
    conversions: u64,
    rating_sum: u64,
    rating_count: u64,
}

impl Tally {
    fn add(&mut self, fold: &SessionFold) {
        self.sessions += 1;
        if fold.converted {
            self.conversions += 1;
        }
        self.rating_sum += fold.ratings.iter().map(|r| u64::from(*r)).sum::<u64>();
        self.rating_count += fold.ratings.len() as u64;
    }

    fn rate(&self) -> f64 {
        if self.sessions == 0 {
            0.0
        } else {
            self.conversions as f64 / self.sessions as f64
        }
    }

    fn mean_satisfaction(&self) -> Option<f64> {
        (self.rating_count > 0).then(|| self.rating_sum as f64 / self.rating_count as f64)
    }
}

pub struct FeedbackAggregator;

impl FeedbackAggregator {
    pub fn aggregate(
        events: &[AnalyticsEvent],
        rules: &[PersonalizationRule],
        settings: AdjustmentSettings,
        now: Timestamp,
    ) -> AggregationReport {
        let sessions = Self::fold_sessions(events);

        AggregationReport {
            culture_stats: Self::culture_stats(&sessions),
            rule_adjustments: Self::rule_adjustments(&sessions, rules, settings),
            experiment_results: Self::experiment_results(&sessions, now),
        }
    }

    fn fold_sessions(events: &[AnalyticsEvent]) -> HashMap<&SessionId, SessionFold> {
        let mut sessions: HashMap<&SessionId, SessionFold> = HashMap::new();
        let mut ordered: Vec<&AnalyticsEvent> = events.iter().collect();
        ordered.sort_by_key(|e| e.timestamp);

        for event in ordered {
            let fold = sessions.entry(&event.session_id).or_default();
            fold.country = Some(event.country_code.clone());
            match &event.payload {
                EventPayload::Detect { .. } => {}
                EventPayload::Adapt {
                    emotion,
                    applied_rules,
                    ..
                } => {
                    fold.adaptations += 1;
                    if emotion.is_some() {
                        fold.emotion = *emotion;
                    }
                    fold.rules.extend(applied_rules.iter().cloned());
                }
                EventPayload::ExperimentAssign {
                    experiment_id,
                    variant,
                } => {
                    fold.variants.insert(experiment_id.clone(), variant.clone());
                }
                EventPayload::Feedback(feedback) => {
                    fold.has_feedback = true;
                    fold.converted |= feedback.converted;
                    if let Some(rating) = feedback.satisfaction {
                        fold.ratings.push(rating);
                    }
                }
            }
        }
        sessions
    }

    fn culture_stats(sessions: &HashMap<&SessionId, SessionFold>) -> Vec<CultureStats> {
        let mut groups: BTreeMap<(CountryCode, Emotion), (Tally, u64)> = BTreeMap::new();
        for fold in sessions.values() {
            let Some(country) = &fold.country else {
                continue;
            };
            let key = (country.clone(), fold.emotion.unwrap_or(Emotion::Neutral));
            let (tally, adaptations) = groups.entry(key).or_default();
            tally.add(fold);
            *adaptations += fold.adaptations;
        }

        groups
            .into_iter()
            .map(|((country_code, emotion), (tally, adaptations))| CultureStats {
                country_code,
                emotion,
                sessions: tally.sessions,
                adaptations,
                conversions: tally.conversions,
                conversion_rate: tally.rate(),
                mean_satisfaction: tally.mean_satisfaction(),
            })
            .collect()
    }

    /// Multiplicative update: `confidence * clamp(observed / expected,
    /// 1 - max_step, 1 + max_step)`, then clamped to the confidence bounds.
    /// `rules` carry their authored confidence, so the same evidence always
    /// yields the same value.
    fn rule_adjustments(
        sessions: &HashMap<&SessionId, SessionFold>,
        rules: &[PersonalizationRule],
        settings: AdjustmentSettings,
    ) -> Vec<RuleAdjustment> {
        let mut tallies: HashMap<&RuleId, Tally> = HashMap::new();
        for fold in sessions.values().filter(|f| f.has_feedback) {
            for rule_id in &fold.rules {
                tallies.entry(rule_id).or_default().add(fold);
            }
        }

        let mut adjustments = Vec::new();
        for rule in rules {
            let Some(tally) = tallies.get(&rule.id) else {
                continue;
            };
            let expected = rule.expected_impact.value();
            if tally.sessions < settings.min_samples || expected <= 0.0 {
                continue;
            }
            let observed = tally.rate();
            let factor = (observed / expected).clamp(1.0 - settings.max_step, 1.0 + settings.max_step);
            let base = rule.confidence.value();
            let adjusted = (base * factor).clamp(settings.min_confidence, settings.max_confidence);

            adjustments.push(RuleAdjustment {
                rule_id: rule.id.clone(),
                samples: tally.sessions,
                observed_rate: observed,
                expected_impact: expected,
                base_confidence: base,
                adjusted_confidence: adjusted,
            });
        }
        adjustments.sort_by(|a, b| a.rule_id.cmp(&b.rule_id));
        adjustments
    }

    fn experiment_results(
        sessions: &HashMap<&SessionId, SessionFold>,
        now: Timestamp,
    ) -> BTreeMap<ExperimentId, ExperimentResults> {
        let mut tallies: BTreeMap<&ExperimentId, BTreeMap<&str, Tally>> = BTreeMap::new();
        for fold in sessions.values().filter(|f| f.has_feedback) {
            for (experiment_id, variant) in &fold.variants {
                tallies
                    .entry(experiment_id)
                    .or_default()
                    .entry(variant.as_str())
                    .or_default()
                    .add(fold);
            }
        }

        tallies
            .into_iter()
            .map(|(experiment_id, variants)| {
                let variants = variants
                    .into_iter()
                    .map(|(name, tally)| {
                        (
                            name.to_string(),
                            VariantResult::new(tally.sessions, tally.conversions, tally.mean_satisfaction()),
                        )
                    })
                    .collect();
                (experiment_id.clone(), ExperimentResults::from_variants(variants, now))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analytics::UserFeedback;
    use crate::domain::foundation::UnitInterval;
    use crate::domain::personalization::{
        AdaptationAction, ElementType, RuleType, TestingPhase, UXAdaptation,
    };

    fn rule(id: &str, expected: f64, confidence: f64) -> PersonalizationRule {
        PersonalizationRule {
            id: RuleId::new(id).unwrap(),
            name: id.to_string(),
            target_countries: BTreeSet::new(),
            target_emotions: BTreeSet::new(),
            conditions: Vec::new(),
            adaptations: vec![UXAdaptation::new(
                ElementType::Cta,
                "#cta",
                AdaptationAction::Remove,
                expected,
            )],
            priority: 1,
            rule_type: RuleType::Cta,
            expected_impact: UnitInterval::new(expected),
            confidence: UnitInterval::new(confidence),
            phase: TestingPhase::Production,
            experiment: None,
        }
    }

    fn session_events(i: usize, country: &str, rule_id: &str, converted: bool) -> Vec<AnalyticsEvent> {
        let session = SessionId::new(format!("s-{}", i)).unwrap();
        let country = CountryCode::new(country).unwrap();
        let base = Timestamp::from_unix_secs(1_700_000_000);
        vec![
            AnalyticsEvent::new(
                session.clone(),
                country.clone(),
                EventPayload::Adapt {
                    emotion: Some(Emotion::Trust),
                    applied_rules: vec![RuleId::new(rule_id).unwrap()],
                    adaptation_count: 1,
                },
            )
            .at(base),
            AnalyticsEvent::new(
                session.clone(),
                country.clone(),
                EventPayload::ExperimentAssign {
                    experiment_id: ExperimentId::new("exp").unwrap(),
                    variant: if i % 2 == 0 { "A" } else { "B" }.to_string(),
                },
            )
            .at(base),
            AnalyticsEvent::new(
                session.clone(),
                country,
                EventPayload::Feedback(UserFeedback::new(session, converted).with_satisfaction(4)),
            )
            .at(base.plus_secs(60)),
        ]
    }

    #[test]
    fn culture_stats_group_by_country_and_emotion() {
        let mut events = Vec::new();
        for i in 0..4 {
            events.extend(session_events(i, "JP", "r", i == 0));
        }
        let report = FeedbackAggregator::aggregate(&events, &[], AdjustmentSettings::default(), Timestamp::now());

        assert_eq!(report.culture_stats.len(), 1);
        let stats = &report.culture_stats[0];
        assert_eq!(stats.emotion, Emotion::Trust);
        assert_eq!(stats.sessions, 4);
        assert_eq!(stats.conversions, 1);
        assert!((stats.conversion_rate - 0.25).abs() < 1e-12);
        assert_eq!(stats.mean_satisfaction, Some(4.0));
    }

    #[test]
    fn rule_needs_minimum_samples() {
        let mut events = Vec::new();
        for i in 0..19 {
            events.extend(session_events(i, "US", "r", true));
        }
        let rules = vec![rule("r", 0.5, 0.5)];
        let report = FeedbackAggregator::aggregate(&events, &rules, AdjustmentSettings::default(), Timestamp::now());
        assert!(report.rule_adjustments.is_empty());
    }

    #[test]
    fn outperforming_rule_gains_bounded_confidence() {
        let mut events = Vec::new();
        for i in 0..20 {
            events.extend(session_events(i, "US", "r", true));
        }
        let rules = vec![rule("r", 0.5, 0.5)];
        let report = FeedbackAggregator::aggregate(&events, &rules, AdjustmentSettings::default(), Timestamp::now());

        let adjustment = &report.rule_adjustments[0];
        assert_eq!(adjustment.samples, 20);
        assert!((adjustment.adjusted_confidence - 0.6).abs() < 1e-12);
    }

    #[test]
    fn underperforming_rule_is_floored() {
        let mut events = Vec::new();
        for i in 0..20 {
            events.extend(session_events(i, "US", "r", false));
        }
        let rules = vec![rule("r", 0.5, 0.11)];
        let report = FeedbackAggregator::aggregate(&events, &rules, AdjustmentSettings::default(), Timestamp::now());
        assert!((report.rule_adjustments[0].adjusted_confidence - 0.1).abs() < 1e-12);
    }

    #[test]
    fn experiment_results_per_variant() {
        let mut events = Vec::new();
        for i in 0..10 {
            events.extend(session_events(i, "US", "r", i % 2 == 1));
        }
        let report = FeedbackAggregator::aggregate(&events, &[], AdjustmentSettings::default(), Timestamp::now());

        let results = &report.experiment_results[&ExperimentId::new("exp").unwrap()];
        assert_eq!(results.variants["A"].sessions, 5);
        assert_eq!(results.variants["A"].conversions, 0);
        assert_eq!(results.variants["B"].conversions, 5);
        assert_eq!(results.leading_variant.as_deref(), Some("B"));
    }
}
