//! In-memory end-to-end tests: engine, analytics queue, feedback loop and
//! experiment lifecycle wired together the way the binary wires them.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;

use cultural_personalization::adapters::{
    AnalyticsWorker, InMemoryAnalyticsWriter, InMemoryCultureStore, InMemoryExperimentRepository,
    QueuedAnalyticsSink, QueuedSinkConfig,
};
use cultural_personalization::application::{
    CulturalProfileRegistry, EngineSettings, ExperimentManager, FeedbackLoop, FeedbackSettings,
    PersonalizationEngine, PersonalizationRequest, RegistrySettings, SignalCollector,
};
use cultural_personalization::domain::analytics::{AnalyticsEventType, UserFeedback};
use cultural_personalization::domain::culture::CulturalProfile;
use cultural_personalization::domain::detection::{DetectionMethod, DetectionSignal};
use cultural_personalization::domain::emotion::EmotionAnalyzer;
use cultural_personalization::domain::experiment::{
    Experiment, ExperimentStatus, TrafficAllocation, Variant,
};
use cultural_personalization::domain::foundation::{
    CountryCode, ExperimentId, Percentage, RuleId, SessionId, Timestamp, UnitInterval,
};
use cultural_personalization::domain::personalization::{
    AdaptationAction, ElementType, PersonalizationRule, RuleType, TestingPhase, UXAdaptation,
};
use cultural_personalization::ports::AnalyticsWriter;

// =============================================================================
// Fixtures
// =============================================================================

fn code(s: &str) -> CountryCode {
    CountryCode::new(s).unwrap()
}

fn rule(id: &str, country: &str, selector: &str, priority: i32, expected: f64, confidence: f64) -> PersonalizationRule {
    PersonalizationRule {
        id: RuleId::new(id).unwrap(),
        name: id.to_string(),
        target_countries: [code(country)].into_iter().collect(),
        target_emotions: BTreeSet::new(),
        conditions: Vec::new(),
        adaptations: vec![UXAdaptation::new(
            ElementType::Cta,
            selector,
            AdaptationAction::Replace {
                original: None,
                value: format!("{} copy", id),
            },
            expected,
        )],
        priority,
        rule_type: RuleType::Cta,
        expected_impact: UnitInterval::new(expected),
        confidence: UnitInterval::new(confidence),
        phase: TestingPhase::Production,
        experiment: None,
    }
}

fn two_arm_experiment(id: &str, country: &str) -> Experiment {
    let arm = |name: &str| {
        Variant::new(
            name,
            vec![UXAdaptation::new(
                ElementType::Layout,
                "#banner",
                AdaptationAction::Add {
                    value: format!("banner {}", name),
                },
                0.1,
            )],
        )
    };
    Experiment::new(
        ExperimentId::new(id).unwrap(),
        "Banner copy",
        vec![arm("a"), arm("b")],
        vec![
            TrafficAllocation::new("a", Percentage::new(50)),
            TrafficAllocation::new("b", Percentage::new(50)),
        ],
    )
    .with_target_countries([code(country)])
}

struct World {
    engine: PersonalizationEngine,
    registry: Arc<CulturalProfileRegistry>,
    feedback: Arc<FeedbackLoop>,
    writer: Arc<InMemoryAnalyticsWriter>,
    repository: Arc<InMemoryExperimentRepository>,
    worker: AnalyticsWorker,
}

async fn world(rules: Vec<PersonalizationRule>) -> World {
    let store = Arc::new(InMemoryCultureStore::new(
        vec![
            CulturalProfile::generic(code("US")),
            CulturalProfile::generic(code("DE")),
            CulturalProfile::generic(code("BR")),
        ],
        rules,
    ));
    let registry = Arc::new(CulturalProfileRegistry::new(
        store,
        RegistrySettings::new(code("US")),
    ));
    registry.refresh().await.unwrap();

    let repository = Arc::new(InMemoryExperimentRepository::default());
    let experiments = Arc::new(ExperimentManager::new(repository.clone()));
    let feedback = Arc::new(FeedbackLoop::new(
        registry.clone(),
        experiments.clone(),
        FeedbackSettings::default(),
    ));
    let writer = Arc::new(InMemoryAnalyticsWriter::new());
    let writers: Vec<Arc<dyn AnalyticsWriter>> = vec![writer.clone(), feedback.clone()];
    let (sink, worker) = QueuedAnalyticsSink::new(
        QueuedSinkConfig {
            capacity: 512,
            write_timeout: Duration::from_millis(500),
        },
        writers,
    );

    let engine = PersonalizationEngine::new(
        registry.clone(),
        experiments,
        SignalCollector::new(None, Duration::from_millis(100)),
        EmotionAnalyzer::default(),
        Arc::new(sink),
        EngineSettings::default(),
    );

    World {
        engine,
        registry,
        feedback,
        writer,
        repository,
        worker,
    }
}

async fn visit(world: &World, session: &str, country: &str, converted: bool) {
    let session = SessionId::new(session).unwrap();
    let request = PersonalizationRequest::new(session.clone()).with_manual_country(code(country));
    world.engine.personalize(&request).await;
    world
        .engine
        .record_feedback(&session, UserFeedback::new(session.clone(), converted))
        .unwrap();
}

fn effective_confidence(registry: &CulturalProfileRegistry, id: &str) -> f64 {
    registry
        .snapshot()
        .rules()
        .iter()
        .find(|r| r.id.as_str() == id)
        .map(|r| r.confidence.value())
        .unwrap()
}

// =============================================================================
// Feedback loop
// =============================================================================

#[tokio::test]
async fn feedback_raises_confidence_of_a_converting_rule() {
    let mut w = world(vec![rule("de-cta", "DE", "#cta", 10, 0.5, 0.5)]).await;
    for i in 0..25 {
        visit(&w, &format!("de-{}", i), "DE", i < 20).await;
    }
    assert_eq!(w.worker.drain().await, 75);
    assert_eq!(w.writer.feedback().len(), 25);

    let report = w.feedback.aggregate_once(Timestamp::now()).await;
    assert_eq!(report.rule_adjustments.len(), 1);
    let adjustment = &report.rule_adjustments[0];
    assert_eq!(adjustment.samples, 25);
    assert!((adjustment.observed_rate - 0.8).abs() < 1e-9);
    assert!((adjustment.adjusted_confidence - 0.6).abs() < 1e-9);
    assert!((effective_confidence(&w.registry, "de-cta") - 0.6).abs() < 1e-9);

    let rerun = w.feedback.aggregate_once(Timestamp::now()).await;
    assert!((rerun.rule_adjustments[0].adjusted_confidence - 0.6).abs() < 1e-9);
    assert!((effective_confidence(&w.registry, "de-cta") - 0.6).abs() < 1e-9);

    let stats = w.feedback.latest_stats();
    let de = stats.iter().find(|s| s.country_code.as_str() == "DE").unwrap();
    assert_eq!(de.sessions, 25);
    assert_eq!(de.conversions, 20);
}

#[tokio::test]
async fn adjustments_survive_a_registry_refresh() {
    let mut w = world(vec![rule("de-cta", "DE", "#cta", 10, 0.5, 0.5)]).await;
    for i in 0..20 {
        visit(&w, &format!("de-{}", i), "DE", false).await;
    }
    w.worker.drain().await;
    w.feedback.aggregate_once(Timestamp::now()).await;
    assert!((effective_confidence(&w.registry, "de-cta") - 0.4).abs() < 1e-9);

    w.registry.refresh().await.unwrap();
    assert!((effective_confidence(&w.registry, "de-cta") - 0.4).abs() < 1e-9);
}

#[tokio::test]
async fn sessions_without_feedback_do_not_move_confidence() {
    let mut w = world(vec![rule("de-cta", "DE", "#cta", 10, 0.5, 0.5)]).await;
    for i in 0..30 {
        let request = PersonalizationRequest::new(SessionId::new(format!("quiet-{}", i)).unwrap())
            .with_manual_country(code("DE"));
        w.engine.personalize(&request).await;
    }
    w.worker.drain().await;

    let report = w.feedback.aggregate_once(Timestamp::now()).await;
    assert!(report.rule_adjustments.is_empty());
    assert!((effective_confidence(&w.registry, "de-cta") - 0.5).abs() < 1e-9);
}

// =============================================================================
// Experiments through the engine
// =============================================================================

#[tokio::test]
async fn experiment_lifecycle_gates_assignment() {
    let mut w = world(vec![]).await;
    let manager = w.engine.experiments();
    let id = ExperimentId::new("banner").unwrap();
    manager.create(two_arm_experiment("banner", "BR")).await.unwrap();

    let enrolled = SessionId::new("early").unwrap();
    let br = code("BR");
    assert!(w.engine.assign_variant(&id, &enrolled, &br).is_none(), "draft serves nobody");

    manager.start(&id).await.unwrap();
    let first = w.engine.assign_variant(&id, &enrolled, &br).unwrap();
    let again = w.engine.assign_variant(&id, &enrolled, &br).unwrap();
    assert_eq!(first.name, again.name);
    assert!(w
        .engine
        .assign_variant(&id, &enrolled, &code("DE"))
        .is_none());

    manager.complete(&id).await.unwrap();
    let late = SessionId::new("late").unwrap();
    assert!(w.engine.assign_variant(&id, &late, &br).is_none());
    assert_eq!(
        w.engine.assign_variant(&id, &enrolled, &br).map(|v| v.name),
        Some(first.name.clone())
    );

    manager.archive(&id).await.unwrap();
    assert!(w.engine.assign_variant(&id, &enrolled, &br).is_none());
    assert_eq!(w.repository.all()[0].status, ExperimentStatus::Archived);

    w.worker.drain().await;
    let assigns = w
        .writer
        .events()
        .iter()
        .filter(|e| e.event_type == AnalyticsEventType::ExperimentAssign)
        .count();
    assert_eq!(assigns, 3);
}

#[tokio::test]
async fn variants_split_traffic_roughly_evenly() {
    let w = world(vec![]).await;
    let manager = w.engine.experiments();
    let id = ExperimentId::new("split").unwrap();
    manager.create(two_arm_experiment("split", "BR")).await.unwrap();
    manager.start(&id).await.unwrap();

    let br = code("BR");
    let a = (0..1000)
        .filter_map(|i| {
            w.engine
                .assign_variant(&id, &SessionId::new(format!("s{}", i)).unwrap(), &br)
        })
        .filter(|v| v.name == "a")
        .count();
    assert!((400..=600).contains(&a), "arm a got {}", a);
}

#[tokio::test]
async fn experiment_results_follow_feedback() {
    let mut w = world(vec![]).await;
    let manager = w.engine.experiments();
    let id = ExperimentId::new("banner").unwrap();
    manager.create(two_arm_experiment("banner", "BR")).await.unwrap();
    manager.start(&id).await.unwrap();

    for i in 0..10 {
        visit(&w, &format!("br-{}", i), "BR", true).await;
    }
    w.worker.drain().await;
    w.feedback.aggregate_once(Timestamp::now()).await;

    let results = manager.get(&id).unwrap().results.unwrap();
    let total: u64 = results.variants.values().map(|v| v.sessions).sum();
    let converted: u64 = results.variants.values().map(|v| v.conversions).sum();
    assert_eq!(total, 10);
    assert_eq!(converted, 10);
    assert!(w.repository.all()[0].results.is_some());
}

// =============================================================================
// Properties
// =============================================================================

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

const METHODS: [DetectionMethod; 5] = [
    DetectionMethod::Ip,
    DetectionMethod::Locale,
    DetectionMethod::NeuralMemory,
    DetectionMethod::Behavior,
    DetectionMethod::Manual,
];
const COUNTRIES: [&str; 5] = ["US", "DE", "BR", "FR", "KR"];

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn detection_is_bounded_and_always_has_a_profile(
        raw in proptest::collection::vec((0usize..5, 0usize..5, 0.0f64..=1.0), 0..8)
    ) {
        let rt = runtime();
        let w = rt.block_on(world(vec![]));
        let signals: Vec<DetectionSignal> = raw
            .iter()
            .map(|(m, c, conf)| DetectionSignal::new(METHODS[*m], code(COUNTRIES[*c]), *conf))
            .collect();

        let detection = w.engine.detect_context(&signals);
        prop_assert!((0.0..=1.0).contains(&detection.confidence));
        if signals.is_empty() {
            prop_assert!(detection.is_fallback());
            prop_assert_eq!(detection.profile.country_code.as_str(), "US");
        } else {
            prop_assert!(signals.iter().any(|s| s.country_code == detection.country_code));
            let known = ["US", "DE", "BR"].contains(&detection.country_code.as_str());
            prop_assert_eq!(detection.profile_resolved, known);
            if !known {
                prop_assert_eq!(detection.profile.country_code.as_str(), "US");
            }
        }
    }

    #[test]
    fn each_selector_appears_once_in_a_plan(
        specs in proptest::collection::vec((0usize..3, -5i32..5, 0.1f64..=1.0), 1..10)
    ) {
        let selectors = ["#cta", "#hero", "#footer"];
        let rules: Vec<PersonalizationRule> = specs
            .iter()
            .enumerate()
            .map(|(i, (s, priority, confidence))| {
                rule(&format!("r{}", i), "DE", selectors[*s], *priority, 0.3, *confidence)
            })
            .collect();

        let rt = runtime();
        let w = rt.block_on(world(rules));
        let detection = w.engine.detect_context(&[DetectionSignal::new(
            DetectionMethod::Manual,
            code("DE"),
            1.0,
        )]);
        let emotion = w.engine.analyze_emotion(&detection.country_code, None);
        let plan = w.engine.get_adaptations(&detection, &emotion);

        let mut seen = HashSet::new();
        for adaptation in &plan.adaptations {
            prop_assert!(seen.insert(adaptation.target_selector.clone()));
        }
        let used: HashSet<&str> = specs.iter().map(|(s, _, _)| selectors[*s]).collect();
        for selector in used {
            prop_assert!(seen.contains(selector));
        }
    }
}
