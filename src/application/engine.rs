//! PersonalizationEngine - The caller-facing service.
//!
//! Every operation is best-effort: collaborator trouble degrades the
//! result (fewer signals, stale catalog, fallback profile) but never
//! surfaces as an error. Analytics are emitted through the sink and never
//! awaited.

use std::sync::Arc;
use std::time::Duration;

use super::detection_cache::DetectionCache;
use super::experiments::ExperimentManager;
use super::registry::{CulturalProfileRegistry, RegistrySnapshot};
use super::signals::{PersonalizationRequest, SignalCollector, MANUAL_CONFIDENCE};
use crate::domain::analytics::{AnalyticsEvent, EventPayload, UserFeedback};
use crate::domain::culture::CulturalProfile;
use crate::domain::detection::{
    DetectionMethod, DetectionResult, DetectionSignal, MethodWeights, MultiSignalDetector,
};
use crate::domain::emotion::{BehavioralTelemetry, EmotionAnalyzer, EmotionDetectionResult};
use crate::domain::experiment::{Variant, VariantAssignment};
use crate::domain::foundation::{CountryCode, DomainError, ExperimentId, SessionId, Timestamp};
use crate::domain::personalization::{
    AdaptationGenerator, AdaptationPlan, GenerationOptions, RuleContext,
};
use crate::ports::AnalyticsSink;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub weights: MethodWeights,
    /// Confidence reported when no signal is available.
    pub fallback_confidence: f64,
    pub cache_ttl: Duration,
    pub serve_staging_rules: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            weights: MethodWeights::default(),
            fallback_confidence: 0.5,
            cache_ttl: Duration::from_secs(1800),
            serve_staging_rules: false,
        }
    }
}

/// Full outcome of one personalization request.
#[derive(Debug, Clone)]
pub struct PersonalizationResponse {
    pub session_id: SessionId,
    pub detection: DetectionResult,
    pub emotion: EmotionDetectionResult,
    pub assignments: Vec<VariantAssignment>,
    pub plan: AdaptationPlan,
}

pub struct PersonalizationEngine {
    registry: Arc<CulturalProfileRegistry>,
    experiments: Arc<ExperimentManager>,
    collector: SignalCollector,
    analyzer: EmotionAnalyzer,
    sink: Arc<dyn AnalyticsSink>,
    cache: DetectionCache,
    settings: EngineSettings,
}

impl PersonalizationEngine {
    pub fn new(
        registry: Arc<CulturalProfileRegistry>,
        experiments: Arc<ExperimentManager>,
        collector: SignalCollector,
        analyzer: EmotionAnalyzer,
        sink: Arc<dyn AnalyticsSink>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            registry,
            experiments,
            collector,
            analyzer,
            sink,
            cache: DetectionCache::new(settings.cache_ttl),
            settings,
        }
    }

    pub fn registry(&self) -> &Arc<CulturalProfileRegistry> {
        &self.registry
    }

    pub fn experiments(&self) -> &Arc<ExperimentManager> {
        &self.experiments
    }

    pub fn cache(&self) -> &DetectionCache {
        &self.cache
    }

    fn generation_options(&self, profile_directives: bool) -> GenerationOptions {
        GenerationOptions {
            serve_staging_rules: self.settings.serve_staging_rules,
            profile_directives,
        }
    }

    /// Fuses signals into a cultural context. Zero signals yield the
    /// fallback profile at the configured fallback confidence.
    pub fn detect_context(&self, signals: &[DetectionSignal]) -> DetectionResult {
        let snapshot = self.registry.snapshot();
        let now = Timestamp::now();

        let Some(fusion) = MultiSignalDetector::fuse(signals, &self.settings.weights) else {
            let profile = snapshot.fallback();
            tracing::debug!(country = %profile.country_code, "No detection signals, using fallback");
            return self.resolve(
                &snapshot,
                profile.country_code.clone(),
                self.settings.fallback_confidence,
                DetectionMethod::Manual,
                (profile, false),
                now,
            );
        };

        let resolved = match snapshot.profile(&fusion.country_code) {
            Some(profile) => (profile, true),
            None => {
                tracing::debug!(
                    country = %fusion.country_code,
                    "No profile for detected country, using fallback profile"
                );
                (snapshot.fallback(), false)
            }
        };
        tracing::debug!(
            country = %fusion.country_code,
            confidence = fusion.confidence,
            method = %fusion.method,
            signals = signals.len(),
            "Cultural context detected"
        );
        self.resolve(
            &snapshot,
            fusion.country_code,
            fusion.confidence,
            fusion.method,
            resolved,
            now,
        )
    }

    fn resolve(
        &self,
        snapshot: &RegistrySnapshot,
        country_code: CountryCode,
        confidence: f64,
        method: DetectionMethod,
        (profile, profile_resolved): (Arc<CulturalProfile>, bool),
        detected_at: Timestamp,
    ) -> DetectionResult {
        let ctx = RuleContext {
            country_code: &country_code,
            profile: &profile,
            detection_confidence: confidence,
            detection_method: method,
            emotion: None,
        };
        let options = self.generation_options(false);
        let rules = AdaptationGenerator::select_rules(&ctx, snapshot.rules(), &[], options);
        let adaptations = AdaptationGenerator::generate(&ctx, snapshot.rules(), &[], options).adaptations;

        DetectionResult {
            country_code,
            confidence: confidence.clamp(0.0, 1.0),
            method,
            profile,
            profile_resolved,
            rules,
            adaptations,
            detected_at,
        }
    }

    /// Collects signals for the request and detects, reusing the session's
    /// cached result unless an explicit selection overrides it.
    pub async fn detect_for_request(&self, request: &PersonalizationRequest) -> DetectionResult {
        let now = Timestamp::now();
        if let Some(cached) = self.cache.get(&request.session_id, now) {
            if !Self::manual_overrides(request, &cached) {
                return cached;
            }
            tracing::debug!(session_id = %request.session_id, "Manual selection invalidates cached detection");
            self.cache.invalidate(&request.session_id);
        }

        let signals = self.collector.collect(request).await;
        let detection = self.detect_context(&signals);
        self.cache
            .insert(request.session_id.clone(), detection.clone(), now);
        self.emit(
            &request.session_id,
            &detection.country_code,
            EventPayload::Detect {
                method: detection.method,
                confidence: detection.confidence,
                profile_resolved: detection.profile_resolved,
            },
        );
        detection
    }

    fn manual_overrides(request: &PersonalizationRequest, cached: &DetectionResult) -> bool {
        let Some(manual) = &request.manual_country else {
            return false;
        };
        MANUAL_CONFIDENCE > cached.confidence || *manual != cached.country_code
    }

    /// Emotion analysis against the country's profile (or the fallback).
    pub fn analyze_emotion(
        &self,
        country_code: &CountryCode,
        telemetry: Option<&BehavioralTelemetry>,
    ) -> EmotionDetectionResult {
        let (profile, _) = self.registry.get_or_fallback(country_code);
        match telemetry {
            Some(telemetry) => self.analyzer.analyze(telemetry, &profile, Timestamp::now().month()),
            None => EmotionDetectionResult::neutral(self.analyzer.settings()),
        }
    }

    /// Adaptation plan from production (and enabled staging) rules plus
    /// profile-derived directives. No experiment variants apply.
    pub fn get_adaptations(
        &self,
        detection: &DetectionResult,
        emotion: &EmotionDetectionResult,
    ) -> AdaptationPlan {
        self.plan(detection, emotion, &[])
    }

    fn plan(
        &self,
        detection: &DetectionResult,
        emotion: &EmotionDetectionResult,
        assignments: &[VariantAssignment],
    ) -> AdaptationPlan {
        let snapshot = self.registry.snapshot();
        let ctx = RuleContext {
            country_code: &detection.country_code,
            profile: &detection.profile,
            detection_confidence: detection.confidence,
            detection_method: detection.method,
            emotion: Some(emotion),
        };
        AdaptationGenerator::generate(&ctx, snapshot.rules(), assignments, self.generation_options(true))
    }

    /// Session-stable variant for one experiment.
    pub fn assign_variant(
        &self,
        experiment_id: &ExperimentId,
        session_id: &SessionId,
        country_code: &CountryCode,
    ) -> Option<Variant> {
        let variant = self.experiments.assign(experiment_id, session_id, country_code)?;
        self.emit(
            session_id,
            country_code,
            EventPayload::ExperimentAssign {
                experiment_id: experiment_id.clone(),
                variant: variant.name.clone(),
            },
        );
        Some(variant)
    }

    /// Validates and records feedback. The event is attributed to the
    /// session's detected country, or the fallback country if unknown.
    pub fn record_feedback(&self, session_id: &SessionId, feedback: UserFeedback) -> Result<(), DomainError> {
        feedback.validate()?;
        if feedback.session_id != *session_id {
            return Err(DomainError::validation(
                "session_id",
                "feedback belongs to a different session",
            ));
        }
        let country = self
            .cache
            .get(session_id, Timestamp::now())
            .map(|d| d.country_code)
            .unwrap_or_else(|| self.registry.settings().fallback_country.clone());
        self.emit(session_id, &country, EventPayload::Feedback(feedback));
        Ok(())
    }

    /// Detect, analyze, bucket and generate for one request.
    pub async fn personalize(&self, request: &PersonalizationRequest) -> PersonalizationResponse {
        let detection = self.detect_for_request(request).await;
        let emotion = self.analyze_emotion_with(&detection, request.telemetry.as_ref());

        let assignments = self.experiments.active_assignments(
            &request.session_id,
            &detection.country_code,
            Some(emotion.dominant),
        );
        for assignment in &assignments {
            self.emit(
                &request.session_id,
                &detection.country_code,
                EventPayload::ExperimentAssign {
                    experiment_id: assignment.experiment_id.clone(),
                    variant: assignment.variant.name.clone(),
                },
            );
        }

        let plan = self.plan(&detection, &emotion, &assignments);
        self.emit(
            &request.session_id,
            &detection.country_code,
            EventPayload::Adapt {
                emotion: Some(emotion.dominant),
                applied_rules: plan.applied_rules.clone(),
                adaptation_count: plan.adaptations.len(),
            },
        );
        tracing::debug!(
            session_id = %request.session_id,
            country = %detection.country_code,
            emotion = %emotion.dominant,
            adaptations = plan.adaptations.len(),
            variants = assignments.len(),
            "Personalization generated"
        );

        PersonalizationResponse {
            session_id: request.session_id.clone(),
            detection,
            emotion,
            assignments,
            plan,
        }
    }

    // Uses the profile already resolved for the detection.
    fn analyze_emotion_with(
        &self,
        detection: &DetectionResult,
        telemetry: Option<&BehavioralTelemetry>,
    ) -> EmotionDetectionResult {
        match telemetry {
            Some(telemetry) => {
                self.analyzer
                    .analyze(telemetry, &detection.profile, Timestamp::now().month())
            }
            None => EmotionDetectionResult::neutral(self.analyzer.settings()),
        }
    }

    fn emit(&self, session_id: &SessionId, country_code: &CountryCode, payload: EventPayload) {
        self.sink
            .emit(AnalyticsEvent::new(session_id.clone(), country_code.clone(), payload));
    }
}
