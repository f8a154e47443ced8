//! Adaptation generation: rules + profile + emotion -> directives.
//!
//! Precedence, highest first: active experiment variants, matching rules
//! (priority desc, confidence desc, id asc), then directives derived from
//! the cultural profile itself. Merging is first-writer-wins per target
//! selector. Enforced taboos are substituted or dropped last.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use super::adaptation::{AdaptationAction, ElementType, UXAdaptation};
use super::condition::RuleContext;
use super::rule::{PersonalizationRule, TestingPhase};
use crate::domain::culture::{DecisionPattern, MessagingTone, SocialProofType, UrgencyInterpretation};
use crate::domain::emotion::Emotion;
use crate::domain::experiment::VariantAssignment;
use crate::domain::foundation::RuleId;

/// Where a directive in the final plan came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AdaptationSource {
    Variant { experiment_id: String, variant: String },
    Rule { rule_id: RuleId },
    Profile,
}

/// What happened to a candidate directive during merging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RationaleOutcome {
    Applied,
    /// A higher-precedence directive already claimed the selector.
    Shadowed,
    /// Adapted value hit an enforced taboo and a safe alternative was used.
    TabooSubstituted,
    /// Adapted value hit an enforced taboo with no safe alternative.
    TabooDropped,
}

/// Audit trail entry for one candidate directive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RationaleEntry {
    pub target_selector: String,
    pub source: AdaptationSource,
    pub outcome: RationaleOutcome,
    pub note: String,
}

/// Deduplicated, precedence-ordered output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdaptationPlan {
    pub adaptations: Vec<UXAdaptation>,
    pub applied_rules: Vec<RuleId>,
    pub rationale: Vec<RationaleEntry>,
}

/// Options for rule selection.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerationOptions {
    pub serve_staging_rules: bool,
    /// Include directives derived from the profile (needs an emotion).
    pub profile_directives: bool,
}

/// Stateless generator.
pub struct AdaptationGenerator;

impl AdaptationGenerator {
    /// Rules that apply to the context, in precedence order.
    pub fn select_rules(
        ctx: &RuleContext<'_>,
        rules: &[Arc<PersonalizationRule>],
        assignments: &[VariantAssignment],
        options: GenerationOptions,
    ) -> Vec<Arc<PersonalizationRule>> {
        let mut selected: Vec<Arc<PersonalizationRule>> = rules
            .iter()
            .filter(|rule| Self::phase_allows(rule, assignments, options))
            .filter(|rule| rule.matches(ctx))
            .cloned()
            .collect();

        selected.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| b.confidence.value().total_cmp(&a.confidence.value()))
                .then_with(|| a.id.cmp(&b.id))
        });
        selected
    }

    fn phase_allows(
        rule: &PersonalizationRule,
        assignments: &[VariantAssignment],
        options: GenerationOptions,
    ) -> bool {
        match rule.phase {
            TestingPhase::Production => true,
            TestingPhase::Staging => options.serve_staging_rules,
            TestingPhase::Testing => rule.experiment.as_ref().is_some_and(|binding| {
                assignments.iter().any(|a| {
                    a.experiment_id == binding.experiment_id && a.variant.name == binding.variant
                })
            }),
        }
    }

    /// Builds the final plan.
    pub fn generate(
        ctx: &RuleContext<'_>,
        rules: &[Arc<PersonalizationRule>],
        assignments: &[VariantAssignment],
        options: GenerationOptions,
    ) -> AdaptationPlan {
        let selected = Self::select_rules(ctx, rules, assignments, options);

        let mut candidates: Vec<(AdaptationSource, UXAdaptation)> = Vec::new();
        for assignment in assignments {
            let source = AdaptationSource::Variant {
                experiment_id: assignment.experiment_id.to_string(),
                variant: assignment.variant.name.clone(),
            };
            for adaptation in &assignment.variant.adaptations {
                candidates.push((source.clone(), adaptation.clone()));
            }
        }
        for rule in &selected {
            let source = AdaptationSource::Rule {
                rule_id: rule.id.clone(),
            };
            for adaptation in &rule.adaptations {
                candidates.push((source.clone(), adaptation.clone()));
            }
        }
        if options.profile_directives {
            for adaptation in Self::profile_directives(ctx) {
                candidates.push((AdaptationSource::Profile, adaptation));
            }
        }

        let mut plan = AdaptationPlan::default();
        let mut claimed: HashSet<String> = HashSet::new();

        // A selector is claimed only once a directive for it is emitted, so a
        // taboo drop leaves it open to lower-precedence directives.
        for (source, adaptation) in candidates {
            if claimed.contains(&adaptation.target_selector) {
                plan.rationale.push(RationaleEntry {
                    target_selector: adaptation.target_selector,
                    source,
                    outcome: RationaleOutcome::Shadowed,
                    note: "selector already claimed by a higher-precedence directive".to_string(),
                });
                continue;
            }

            let (adaptation, outcome, note) = match Self::screen_taboos(ctx, adaptation) {
                Screened::Clean(a) => {
                    let note = a.cultural_rationale.clone();
                    (a, RationaleOutcome::Applied, note)
                }
                Screened::Substituted(a, taboo) => (
                    a,
                    RationaleOutcome::TabooSubstituted,
                    format!("replaced taboo element '{}'", taboo),
                ),
                Screened::Dropped(selector, taboo) => {
                    plan.rationale.push(RationaleEntry {
                        target_selector: selector,
                        source,
                        outcome: RationaleOutcome::TabooDropped,
                        note: format!("taboo element '{}' has no safe alternative", taboo),
                    });
                    continue;
                }
            };

            claimed.insert(adaptation.target_selector.clone());
            if let AdaptationSource::Rule { rule_id } = &source {
                if !plan.applied_rules.contains(rule_id) {
                    plan.applied_rules.push(rule_id.clone());
                }
            }
            plan.rationale.push(RationaleEntry {
                target_selector: adaptation.target_selector.clone(),
                source,
                outcome,
                note,
            });
            plan.adaptations.push(adaptation);
        }

        plan
    }

    fn screen_taboos(ctx: &RuleContext<'_>, adaptation: UXAdaptation) -> Screened {
        let Some(value) = adaptation.action.adapted_value() else {
            return Screened::Clean(adaptation);
        };
        let Some(taboo) = ctx.profile.enforced_taboo(value) else {
            return Screened::Clean(adaptation);
        };

        match taboo.safe_alternatives.first() {
            Some(alternative) => {
                let replaced = replace_token(value, &taboo.element, alternative);
                Screened::Substituted(adaptation.with_adapted_value(replaced), taboo.element.clone())
            }
            None => Screened::Dropped(adaptation.target_selector, taboo.element.clone()),
        }
    }

    /// Baseline directives implied by the profile and dominant emotion.
    fn profile_directives(ctx: &RuleContext<'_>) -> Vec<UXAdaptation> {
        let Some(emotion) = ctx.emotion else {
            return Vec::new();
        };
        let profile = ctx.profile;
        let Some(emotion_profile) = profile.emotion(emotion.dominant) else {
            return Vec::new();
        };
        let impact = 0.5 * emotion.intensity * emotion.confidence;
        let why = |what: &str| {
            format!(
                "{} for {} visitors feeling {}",
                what, profile.region_name, emotion.dominant
            )
        };
        let mut directives = Vec::new();

        if let Some(color) = emotion_profile
            .color_associations
            .iter()
            .find(|c| !profile.colors.get(*c).is_some_and(|m| m.is_forbidden_in("cta")))
        {
            directives.push(
                UXAdaptation::new(
                    ElementType::Color,
                    "[data-cp-accent]",
                    AdaptationAction::Style {
                        property: "--accent-color".to_string(),
                        value: color.clone(),
                    },
                    impact,
                )
                .with_rationale(why("accent color associated with the emotion")),
            );
        }

        directives.push(
            UXAdaptation::new(
                ElementType::Text,
                "[data-cp-tone]",
                AdaptationAction::Modify {
                    original: None,
                    value: tone_name(emotion_profile.messaging_tone).to_string(),
                },
                impact,
            )
            .with_rationale(why("messaging tone")),
        );

        directives.push(
            UXAdaptation::new(
                ElementType::Cta,
                "[data-cp-cta]",
                AdaptationAction::Replace {
                    original: None,
                    value: cta_copy(emotion_profile.decision_pattern).to_string(),
                },
                impact,
            )
            .with_rationale(why("call to action matching the decision pattern")),
        );

        let urgency = emotion_profile.urgency_interpretation;
        if urgency.discourages_urgency() || emotion.dominant == Emotion::Anxiety {
            directives.push(
                UXAdaptation::new(ElementType::Text, "[data-cp-urgency]", AdaptationAction::Remove, impact)
                    .with_rationale(why("urgency framing suppressed")),
            );
        } else if matches!(
            urgency,
            UrgencyInterpretation::Motivating | UrgencyInterpretation::Positive
        ) {
            if let Some(trigger) = profile.conversion_triggers.first() {
                directives.push(
                    UXAdaptation::new(
                        ElementType::Text,
                        "[data-cp-urgency]",
                        AdaptationAction::Add {
                            value: trigger.clone(),
                        },
                        impact,
                    )
                    .with_rationale(why("urgency framing reads as motivating")),
                );
            }
        }

        if let Some(proof) = profile.best_social_proof() {
            directives.push(
                UXAdaptation::new(
                    ElementType::SocialProof,
                    "[data-cp-social-proof]",
                    AdaptationAction::Replace {
                        original: None,
                        value: social_proof_name(proof).to_string(),
                    },
                    impact,
                )
                .with_rationale(why("most effective social proof")),
            );
        }

        if let Some(indicator) = profile.trust_indicators.first() {
            directives.push(
                UXAdaptation::new(
                    ElementType::Layout,
                    "[data-cp-trust]",
                    AdaptationAction::Add {
                        value: indicator.clone(),
                    },
                    impact,
                )
                .with_rationale(why("leading trust indicator")),
            );
        }

        directives
    }
}

enum Screened {
    Clean(UXAdaptation),
    Substituted(UXAdaptation, String),
    Dropped(String, String),
}

/// Replaces whole-token, case-insensitive occurrences of `needle`.
fn replace_token(haystack: &str, needle: &str, replacement: &str) -> String {
    let mut out = String::with_capacity(haystack.len());
    let mut token = String::new();
    let flush = |token: &mut String, out: &mut String| {
        if token.eq_ignore_ascii_case(needle) {
            out.push_str(replacement);
        } else {
            out.push_str(token);
        }
        token.clear();
    };
    for c in haystack.chars() {
        if c.is_alphanumeric() || c == '#' {
            token.push(c);
        } else {
            flush(&mut token, &mut out);
            out.push(c);
        }
    }
    flush(&mut token, &mut out);
    out
}

fn tone_name(tone: MessagingTone) -> &'static str {
    match tone {
        MessagingTone::Formal => "formal",
        MessagingTone::Friendly => "friendly",
        MessagingTone::Reassuring => "reassuring",
        MessagingTone::Enthusiastic => "enthusiastic",
        MessagingTone::Authoritative => "authoritative",
        MessagingTone::Playful => "playful",
    }
}

fn cta_copy(pattern: DecisionPattern) -> &'static str {
    match pattern {
        DecisionPattern::Analytical => "Compare the details",
        DecisionPattern::Intuitive => "Get started",
        DecisionPattern::SocialProofDriven => "Join thousands of customers",
        DecisionPattern::AuthorityDriven => "Recommended by experts",
    }
}

fn social_proof_name(proof: SocialProofType) -> &'static str {
    match proof {
        SocialProofType::Testimonials => "testimonials",
        SocialProofType::ExpertEndorsement => "expert_endorsement",
        SocialProofType::UserCount => "user_count",
        SocialProofType::Ratings => "ratings",
        SocialProofType::MediaMentions => "media_mentions",
        SocialProofType::PeerActivity => "peer_activity",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::culture::{CulturalProfile, TabooElement, TabooSeverity};
    use crate::domain::detection::DetectionMethod;
    use crate::domain::emotion::{EmotionDetectionResult, EmotionSettings};
    use crate::domain::experiment::Variant;
    use crate::domain::foundation::{CountryCode, ExperimentId, UnitInterval};
    use crate::domain::personalization::{RuleType, VariantBinding};
    use std::collections::BTreeSet;

    fn adaptation(selector: &str, value: &str) -> UXAdaptation {
        UXAdaptation::new(
            ElementType::Text,
            selector,
            AdaptationAction::Replace {
                original: None,
                value: value.to_string(),
            },
            0.3,
        )
    }

    fn rule(id: &str, priority: i32, confidence: f64, adaptations: Vec<UXAdaptation>) -> Arc<PersonalizationRule> {
        Arc::new(PersonalizationRule {
            id: RuleId::new(id).unwrap(),
            name: id.to_string(),
            target_countries: BTreeSet::new(),
            target_emotions: BTreeSet::new(),
            conditions: Vec::new(),
            adaptations,
            priority,
            rule_type: RuleType::Content,
            expected_impact: UnitInterval::new(0.3),
            confidence: UnitInterval::new(confidence),
            phase: TestingPhase::Production,
            experiment: None,
        })
    }

    struct Fixture {
        code: CountryCode,
        profile: CulturalProfile,
        emotion: EmotionDetectionResult,
    }

    impl Fixture {
        fn new() -> Self {
            let code = CountryCode::new("US").unwrap();
            let mut emotion = EmotionDetectionResult::neutral(&EmotionSettings::default());
            emotion.dominant = Emotion::Excitement;
            emotion.intensity = 0.8;
            emotion.confidence = 0.9;
            Self {
                profile: CulturalProfile::generic(code.clone()),
                code,
                emotion,
            }
        }

        fn ctx(&self) -> RuleContext<'_> {
            RuleContext {
                country_code: &self.code,
                profile: &self.profile,
                detection_confidence: 0.5,
                detection_method: DetectionMethod::Ip,
                emotion: Some(&self.emotion),
            }
        }
    }

    #[test]
    fn higher_priority_wins_shared_selector() {
        let f = Fixture::new();
        let rules = vec![
            rule("low", 1, 0.9, vec![adaptation("#headline", "low")]),
            rule("high", 10, 0.1, vec![adaptation("#headline", "high")]),
        ];

        let plan = AdaptationGenerator::generate(&f.ctx(), &rules, &[], GenerationOptions::default());

        assert_eq!(plan.adaptations.len(), 1);
        assert_eq!(plan.adaptations[0].action.adapted_value(), Some("high"));
        assert_eq!(plan.applied_rules, vec![RuleId::new("high").unwrap()]);
        assert!(plan
            .rationale
            .iter()
            .any(|r| r.outcome == RationaleOutcome::Shadowed));
    }

    #[test]
    fn equal_priority_breaks_on_confidence() {
        let f = Fixture::new();
        let rules = vec![
            rule("a", 5, 0.4, vec![adaptation("#x", "a")]),
            rule("b", 5, 0.8, vec![adaptation("#x", "b")]),
        ];
        let plan = AdaptationGenerator::generate(&f.ctx(), &rules, &[], GenerationOptions::default());
        assert_eq!(plan.adaptations[0].action.adapted_value(), Some("b"));
    }

    #[test]
    fn testing_rule_requires_matching_assignment() {
        let f = Fixture::new();
        let experiment_id = ExperimentId::new("hero-test").unwrap();
        let mut testing = (*rule("t", 100, 0.5, vec![adaptation("#hero", "bold")])).clone();
        testing.phase = TestingPhase::Testing;
        testing.experiment = Some(VariantBinding {
            experiment_id: experiment_id.clone(),
            variant: "B".to_string(),
        });
        let rules = vec![Arc::new(testing)];

        let none = AdaptationGenerator::generate(&f.ctx(), &rules, &[], GenerationOptions::default());
        assert!(none.adaptations.is_empty());

        let other = VariantAssignment {
            experiment_id: experiment_id.clone(),
            variant: Variant::new("A", Vec::new()),
        };
        let plan = AdaptationGenerator::generate(&f.ctx(), &rules, &[other], GenerationOptions::default());
        assert!(plan.adaptations.is_empty());

        let matching = VariantAssignment {
            experiment_id,
            variant: Variant::new("B", Vec::new()),
        };
        let plan = AdaptationGenerator::generate(&f.ctx(), &rules, &[matching], GenerationOptions::default());
        assert_eq!(plan.adaptations.len(), 1);
    }

    #[test]
    fn staging_rules_need_opt_in() {
        let f = Fixture::new();
        let mut staging = (*rule("s", 1, 0.5, vec![adaptation("#s", "x")])).clone();
        staging.phase = TestingPhase::Staging;
        let rules = vec![Arc::new(staging)];

        let off = AdaptationGenerator::generate(&f.ctx(), &rules, &[], GenerationOptions::default());
        assert!(off.adaptations.is_empty());

        let on = AdaptationGenerator::generate(
            &f.ctx(),
            &rules,
            &[],
            GenerationOptions {
                serve_staging_rules: true,
                ..Default::default()
            },
        );
        assert_eq!(on.adaptations.len(), 1);
    }

    #[test]
    fn variant_adaptations_outrank_rules() {
        let f = Fixture::new();
        let rules = vec![rule("r", 1000, 1.0, vec![adaptation("#cta", "rule")])];
        let assignment = VariantAssignment {
            experiment_id: ExperimentId::new("e").unwrap(),
            variant: Variant::new("B", vec![adaptation("#cta", "variant")]),
        };

        let plan = AdaptationGenerator::generate(&f.ctx(), &rules, &[assignment], GenerationOptions::default());
        assert_eq!(plan.adaptations.len(), 1);
        assert_eq!(plan.adaptations[0].action.adapted_value(), Some("variant"));
        assert!(plan.applied_rules.is_empty());
    }

    #[test]
    fn profile_directives_fill_unclaimed_selectors() {
        let f = Fixture::new();
        let rules = vec![rule("r", 1, 1.0, vec![adaptation("[data-cp-tone]", "formal")])];
        let plan = AdaptationGenerator::generate(
            &f.ctx(),
            &rules,
            &[],
            GenerationOptions {
                profile_directives: true,
                ..Default::default()
            },
        );

        let tone = plan
            .adaptations
            .iter()
            .find(|a| a.target_selector == "[data-cp-tone]")
            .unwrap();
        assert_eq!(tone.action.adapted_value(), Some("formal"));
        assert!(plan.adaptations.iter().any(|a| a.element_type == ElementType::SocialProof));
        assert!(plan.adaptations.iter().any(|a| a.target_selector == "[data-cp-accent]"));
    }

    #[test]
    fn enforced_taboos_are_substituted_or_dropped() {
        let mut f = Fixture::new();
        f.profile.taboos = vec![
            TabooElement {
                element: "four".to_string(),
                severity: TabooSeverity::Critical,
                context: None,
                safe_alternatives: vec!["five".to_string()],
            },
            TabooElement {
                element: "skull".to_string(),
                severity: TabooSeverity::High,
                context: None,
                safe_alternatives: vec![],
            },
        ];
        let rules = vec![rule(
            "r",
            1,
            1.0,
            vec![adaptation("#offer", "Save Four dollars"), adaptation("#icon", "skull")],
        )];

        let plan = AdaptationGenerator::generate(&f.ctx(), &rules, &[], GenerationOptions::default());

        assert_eq!(plan.adaptations.len(), 1);
        assert_eq!(plan.adaptations[0].action.adapted_value(), Some("Save five dollars"));
        assert!(plan
            .rationale
            .iter()
            .any(|r| r.outcome == RationaleOutcome::TabooDropped && r.target_selector == "#icon"));
    }

    #[test]
    fn dropped_directive_leaves_selector_to_next_in_line() {
        let mut f = Fixture::new();
        f.profile.taboos = vec![TabooElement {
            element: "skull".to_string(),
            severity: TabooSeverity::High,
            context: None,
            safe_alternatives: vec![],
        }];
        let rules = vec![
            rule("edgy", 10, 0.9, vec![adaptation("#icon", "skull")]),
            rule("plain", 1, 0.5, vec![adaptation("#icon", "star")]),
        ];

        let plan = AdaptationGenerator::generate(&f.ctx(), &rules, &[], GenerationOptions::default());

        assert_eq!(plan.adaptations.len(), 1);
        assert_eq!(plan.adaptations[0].action.adapted_value(), Some("star"));
        assert_eq!(plan.applied_rules, vec![RuleId::new("plain").unwrap()]);
        assert!(plan
            .rationale
            .iter()
            .all(|r| r.outcome != RationaleOutcome::Shadowed));
        assert!(plan
            .rationale
            .iter()
            .any(|r| r.outcome == RationaleOutcome::TabooDropped));
    }

    #[test]
    fn replace_token_respects_word_boundaries() {
        assert_eq!(replace_token("four fourteen Four", "four", "5"), "5 fourteen 5");
    }
}
