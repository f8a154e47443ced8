//! In-memory collaborators for tests and local runs.
//!
//! Every store can be switched into a failing mode to exercise the
//! degraded paths of the engine.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use crate::domain::analytics::{AnalyticsEvent, UserFeedback};
use crate::domain::culture::CulturalProfile;
use crate::domain::experiment::{Experiment, ExperimentStatus};
use crate::domain::foundation::DomainError;
use crate::domain::personalization::{PersonalizationRule, TestingPhase};
use crate::ports::{AnalyticsWriter, CultureStore, ExperimentRepository};

/// Culture catalog held in memory.
#[derive(Default)]
pub struct InMemoryCultureStore {
    profiles: RwLock<Vec<CulturalProfile>>,
    rules: RwLock<Vec<PersonalizationRule>>,
    failing: AtomicBool,
}

impl InMemoryCultureStore {
    pub fn new(profiles: Vec<CulturalProfile>, rules: Vec<PersonalizationRule>) -> Self {
        Self {
            profiles: RwLock::new(profiles),
            rules: RwLock::new(rules),
            failing: AtomicBool::new(false),
        }
    }

    /// Replaces the catalog contents, as an authoring publish would.
    pub fn replace(&self, profiles: Vec<CulturalProfile>, rules: Vec<PersonalizationRule>) {
        *self.profiles.write().unwrap_or_else(PoisonError::into_inner) = profiles;
        *self.rules.write().unwrap_or_else(PoisonError::into_inner) = rules;
    }

    /// Makes every subsequent load fail with `CollaboratorUnavailable`.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), DomainError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DomainError::unavailable("culture_store", "store is offline"));
        }
        Ok(())
    }
}

#[async_trait]
impl CultureStore for InMemoryCultureStore {
    async fn load_cultural_profiles(&self) -> Result<Vec<CulturalProfile>, DomainError> {
        self.check()?;
        Ok(self
            .profiles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn load_personalization_rules(
        &self,
        active_only: bool,
    ) -> Result<Vec<PersonalizationRule>, DomainError> {
        self.check()?;
        let rules = self.rules.read().unwrap_or_else(PoisonError::into_inner);
        Ok(rules
            .iter()
            .filter(|r| !active_only || r.phase == TestingPhase::Production)
            .cloned()
            .collect())
    }
}

/// Experiment repository held in memory.
#[derive(Default)]
pub struct InMemoryExperimentRepository {
    experiments: RwLock<Vec<Experiment>>,
    failing: AtomicBool,
}

impl InMemoryExperimentRepository {
    pub fn new(experiments: Vec<Experiment>) -> Self {
        Self {
            experiments: RwLock::new(experiments),
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Snapshot of everything saved so far.
    pub fn all(&self) -> Vec<Experiment> {
        self.experiments
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ExperimentRepository for InMemoryExperimentRepository {
    async fn load_experiments(
        &self,
        status: Option<ExperimentStatus>,
    ) -> Result<Vec<Experiment>, DomainError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DomainError::unavailable("experiment_repository", "repository is offline"));
        }
        let experiments = self.experiments.read().unwrap_or_else(PoisonError::into_inner);
        Ok(experiments
            .iter()
            .filter(|e| status.map_or(true, |s| e.status == s))
            .cloned()
            .collect())
    }

    async fn save(&self, experiment: &Experiment) -> Result<(), DomainError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DomainError::unavailable("experiment_repository", "repository is offline"));
        }
        let mut experiments = self.experiments.write().unwrap_or_else(PoisonError::into_inner);
        match experiments.iter_mut().find(|e| e.id == experiment.id) {
            Some(existing) => *existing = experiment.clone(),
            None => experiments.push(experiment.clone()),
        }
        Ok(())
    }
}

/// Analytics writer that keeps everything in memory.
#[derive(Default)]
pub struct InMemoryAnalyticsWriter {
    events: RwLock<Vec<AnalyticsEvent>>,
    feedback: RwLock<Vec<UserFeedback>>,
    failing: AtomicBool,
}

impl InMemoryAnalyticsWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<AnalyticsEvent> {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn feedback(&self) -> Vec<UserFeedback> {
        self.feedback
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn check(&self) -> Result<(), DomainError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DomainError::unavailable("analytics_writer", "writer is offline"));
        }
        Ok(())
    }
}

#[async_trait]
impl AnalyticsWriter for InMemoryAnalyticsWriter {
    async fn append_analytics_event(&self, event: &AnalyticsEvent) -> Result<(), DomainError> {
        self.check()?;
        self.events
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
        Ok(())
    }

    async fn append_feedback(&self, feedback: &UserFeedback) -> Result<(), DomainError> {
        self.check()?;
        self.feedback
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(feedback.clone());
        Ok(())
    }
}
