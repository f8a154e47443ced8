//! FeedbackLoop - Event log plus the periodic aggregation job.
//!
//! The loop is fed by the analytics worker (it is just another
//! [`AnalyticsWriter`]) and never sits on the request path. Each run
//! aggregates the retained log, derives rule confidence from the authored
//! value and the observed outcomes, and stores experiment results on the
//! experiment manager.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;

use super::experiments::ExperimentManager;
use super::registry::CulturalProfileRegistry;
use crate::domain::analytics::{
    AdjustmentSettings, AggregationReport, AnalyticsEvent, CultureStats, FeedbackAggregator,
    UserFeedback,
};
use crate::domain::foundation::{DomainError, Timestamp};
use crate::domain::personalization::PersonalizationRule;
use crate::ports::AnalyticsWriter;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeedbackSettings {
    pub interval: Duration,
    pub adjustment: AdjustmentSettings,
    /// Oldest events are evicted beyond this many.
    pub max_events: usize,
}

impl Default for FeedbackSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(900),
            adjustment: AdjustmentSettings::default(),
            max_events: 100_000,
        }
    }
}

pub struct FeedbackLoop {
    registry: Arc<CulturalProfileRegistry>,
    experiments: Arc<ExperimentManager>,
    settings: FeedbackSettings,
    events: RwLock<VecDeque<AnalyticsEvent>>,
    latest: RwLock<Option<AggregationReport>>,
}

impl FeedbackLoop {
    pub fn new(
        registry: Arc<CulturalProfileRegistry>,
        experiments: Arc<ExperimentManager>,
        settings: FeedbackSettings,
    ) -> Self {
        Self {
            registry,
            experiments,
            settings,
            events: RwLock::new(VecDeque::new()),
            latest: RwLock::new(None),
        }
    }

    /// Appends an event to the log.
    pub fn record(&self, event: AnalyticsEvent) {
        let mut events = self.events.write().unwrap_or_else(PoisonError::into_inner);
        events.push_back(event);
        while events.len() > self.settings.max_events {
            events.pop_front();
        }
    }

    pub fn event_count(&self) -> usize {
        self.events.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Per-(country, emotion) statistics from the last run.
    pub fn latest_stats(&self) -> Vec<CultureStats> {
        self.latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|report| report.culture_stats.clone())
            .unwrap_or_default()
    }

    pub fn latest_report(&self) -> Option<AggregationReport> {
        self.latest.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// One aggregation pass over the retained log.
    pub async fn aggregate_once(&self, now: Timestamp) -> AggregationReport {
        let events: Vec<AnalyticsEvent> = self
            .events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect();
        let rules: Vec<PersonalizationRule> = self.registry.authored_rules();

        let report = FeedbackAggregator::aggregate(&events, &rules, self.settings.adjustment, now);

        for adjustment in &report.rule_adjustments {
            tracing::debug!(
                rule_id = %adjustment.rule_id,
                samples = adjustment.samples,
                observed_rate = adjustment.observed_rate,
                base = adjustment.base_confidence,
                adjusted = adjustment.adjusted_confidence,
                "Rule confidence adjusted"
            );
        }
        self.registry.apply_confidence_adjustments(&report.rule_adjustments);
        self.experiments
            .record_results(report.experiment_results.clone())
            .await;

        tracing::info!(
            events = events.len(),
            groups = report.culture_stats.len(),
            adjusted_rules = report.rule_adjustments.len(),
            experiments = report.experiment_results.len(),
            "Feedback aggregation complete"
        );

        *self.latest.write().unwrap_or_else(PoisonError::into_inner) = Some(report.clone());
        report
    }

    /// Runs aggregation on the configured interval until shutdown.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.settings.interval);
        interval.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("Feedback loop stopped");
                        return;
                    }
                }
                _ = interval.tick() => {
                    self.aggregate_once(Timestamp::now()).await;
                }
            }
        }
    }
}

#[async_trait]
impl AnalyticsWriter for FeedbackLoop {
    async fn append_analytics_event(&self, event: &AnalyticsEvent) -> Result<(), DomainError> {
        self.record(event.clone());
        Ok(())
    }

    // Feedback also arrives as a Feedback event; the record alone adds nothing.
    async fn append_feedback(&self, _feedback: &UserFeedback) -> Result<(), DomainError> {
        Ok(())
    }
}
