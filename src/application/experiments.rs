//! ExperimentManager - Lifecycle operations and session bucketing.
//!
//! Experiments live in memory and are written through to the repository on
//! every transition. Bucketing itself is a pure hash; the manager only
//! records enrollments so that completed experiments can keep serving the
//! sessions they already bucketed. Enrollments expire with the session TTL
//! and are capped per experiment.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use crate::domain::emotion::Emotion;
use crate::domain::experiment::{
    Experiment, ExperimentResults, ExperimentStatus, Variant, VariantAssignment,
};
use crate::domain::foundation::{
    CountryCode, DomainError, ErrorCode, ExperimentId, SessionId, Timestamp,
};
use crate::ports::ExperimentRepository;

const DEFAULT_ENROLLMENT_TTL: Duration = Duration::from_secs(1800);
const DEFAULT_MAX_ENROLLMENTS: usize = 100_000;

struct Enrollment {
    variant: String,
    last_seen: Timestamp,
}

pub struct ExperimentManager {
    repository: Arc<dyn ExperimentRepository>,
    experiments: RwLock<BTreeMap<ExperimentId, Experiment>>,
    enrollments: RwLock<HashMap<ExperimentId, HashMap<SessionId, Enrollment>>>,
    enrollment_ttl: Duration,
    /// Per experiment; the least recently seen session is evicted beyond it.
    max_enrollments: usize,
}

/// Transition requested on an experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExperimentTransition {
    Start,
    Pause,
    Resume,
    Complete,
    Archive,
}

impl ExperimentManager {
    pub fn new(repository: Arc<dyn ExperimentRepository>) -> Self {
        Self {
            repository,
            experiments: RwLock::new(BTreeMap::new()),
            enrollments: RwLock::new(HashMap::new()),
            enrollment_ttl: DEFAULT_ENROLLMENT_TTL,
            max_enrollments: DEFAULT_MAX_ENROLLMENTS,
        }
    }

    /// Sessions unseen for `ttl` lose their enrollment.
    pub fn with_enrollment_limits(mut self, ttl: Duration, max_per_experiment: usize) -> Self {
        self.enrollment_ttl = ttl;
        self.max_enrollments = max_per_experiment.max(1);
        self
    }

    /// Loads every experiment from the repository, replacing what is held.
    pub async fn load(&self) -> Result<usize, DomainError> {
        let loaded = self.repository.load_experiments(None).await?;
        let count = loaded.len();
        let mut experiments = self.experiments.write().unwrap_or_else(PoisonError::into_inner);
        *experiments = loaded.into_iter().map(|e| (e.id.clone(), e)).collect();
        tracing::info!(experiments = count, "Experiments loaded");
        Ok(count)
    }

    /// Registers a new draft experiment.
    pub async fn create(&self, mut experiment: Experiment) -> Result<Experiment, DomainError> {
        experiment.validate()?;
        experiment.status = ExperimentStatus::Draft;
        {
            let mut experiments = self.experiments.write().unwrap_or_else(PoisonError::into_inner);
            if experiments.contains_key(&experiment.id) {
                return Err(DomainError::new(
                    ErrorCode::InvalidExperimentConfig,
                    format!("experiment '{}' already exists", experiment.id),
                ));
            }
            experiments.insert(experiment.id.clone(), experiment.clone());
        }
        self.persist(&experiment).await;
        Ok(experiment)
    }

    pub fn get(&self, id: &ExperimentId) -> Option<Experiment> {
        self.experiments
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    pub fn list(&self, status: Option<ExperimentStatus>) -> Vec<Experiment> {
        self.experiments
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|e| status.map_or(true, |s| e.status == s))
            .cloned()
            .collect()
    }

    pub async fn start(&self, id: &ExperimentId) -> Result<Experiment, DomainError> {
        self.transition(id, ExperimentTransition::Start).await
    }

    pub async fn pause(&self, id: &ExperimentId) -> Result<Experiment, DomainError> {
        self.transition(id, ExperimentTransition::Pause).await
    }

    pub async fn resume(&self, id: &ExperimentId) -> Result<Experiment, DomainError> {
        self.transition(id, ExperimentTransition::Resume).await
    }

    pub async fn complete(&self, id: &ExperimentId) -> Result<Experiment, DomainError> {
        self.transition(id, ExperimentTransition::Complete).await
    }

    pub async fn archive(&self, id: &ExperimentId) -> Result<Experiment, DomainError> {
        let archived = self.transition(id, ExperimentTransition::Archive).await?;
        self.enrollments
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        Ok(archived)
    }

    /// Drops enrollments unseen for longer than the TTL; returns how many.
    pub fn purge_expired_enrollments(&self, now: Timestamp) -> usize {
        let ttl = self.enrollment_ttl.as_secs();
        let mut enrollments = self.enrollments.write().unwrap_or_else(PoisonError::into_inner);
        let mut purged = 0;
        for sessions in enrollments.values_mut() {
            let before = sessions.len();
            sessions.retain(|_, e| now.is_before(&e.last_seen.plus_secs(ttl)));
            purged += before - sessions.len();
        }
        enrollments.retain(|_, sessions| !sessions.is_empty());
        purged
    }

    pub fn enrollment_count(&self) -> usize {
        self.enrollments
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(HashMap::len)
            .sum()
    }

    /// Applies the transition in memory, then persists. A failed save is
    /// logged; the in-memory state is authoritative until the next load.
    async fn transition(
        &self,
        id: &ExperimentId,
        transition: ExperimentTransition,
    ) -> Result<Experiment, DomainError> {
        let updated = {
            let mut experiments = self.experiments.write().unwrap_or_else(PoisonError::into_inner);
            let experiment = experiments.get_mut(id).ok_or_else(|| Self::not_found(id))?;
            let now = Timestamp::now();
            match transition {
                ExperimentTransition::Start => experiment.start(now)?,
                ExperimentTransition::Pause => experiment.pause()?,
                ExperimentTransition::Resume => experiment.resume()?,
                ExperimentTransition::Complete => experiment.complete(now)?,
                ExperimentTransition::Archive => experiment.archive()?,
            }
            experiment.clone()
        };

        tracing::info!(
            experiment_id = %id,
            status = %updated.status,
            "Experiment status changed"
        );
        self.persist(&updated).await;
        Ok(updated)
    }

    async fn persist(&self, experiment: &Experiment) {
        if let Err(e) = self.repository.save(experiment).await {
            tracing::warn!(
                experiment_id = %experiment.id,
                error = %e,
                "Failed to persist experiment, keeping in-memory state"
            );
        }
    }

    fn not_found(id: &ExperimentId) -> DomainError {
        DomainError::new(
            ErrorCode::ExperimentNotFound,
            format!("experiment '{}' not found", id),
        )
        .with_detail("experiment_id", id.as_str())
    }

    /// Variant for the session, or `None` when the experiment is unknown,
    /// not serving, or does not target the country.
    ///
    /// Running experiments bucket by hash. Completed experiments only serve
    /// sessions bucketed while they were running.
    pub fn assign(
        &self,
        id: &ExperimentId,
        session_id: &SessionId,
        country: &CountryCode,
    ) -> Option<Variant> {
        let experiments = self.experiments.read().unwrap_or_else(PoisonError::into_inner);
        let experiment = experiments.get(id)?;
        self.assign_within(experiment, session_id, country, Timestamp::now())
    }

    fn assign_within(
        &self,
        experiment: &Experiment,
        session_id: &SessionId,
        country: &CountryCode,
        now: Timestamp,
    ) -> Option<Variant> {
        match experiment.status {
            ExperimentStatus::Running => {
                let variant = experiment.assign(session_id, country)?.clone();
                if self.enrolled_variant(&experiment.id, session_id, now).is_none() {
                    self.enroll(&experiment.id, session_id, &variant.name, now);
                }
                Some(variant)
            }
            ExperimentStatus::Completed => {
                let name = self.enrolled_variant(&experiment.id, session_id, now)?;
                experiment.variant(&name).cloned()
            }
            ExperimentStatus::Draft | ExperimentStatus::Paused | ExperimentStatus::Archived => None,
        }
    }

    /// Live enrollment for the session. Only takes the write lock to refresh
    /// an entry past half its TTL.
    fn enrolled_variant(
        &self,
        id: &ExperimentId,
        session_id: &SessionId,
        now: Timestamp,
    ) -> Option<String> {
        let ttl = self.enrollment_ttl.as_secs();
        let (name, stale) = {
            let enrollments = self.enrollments.read().unwrap_or_else(PoisonError::into_inner);
            let entry = enrollments.get(id)?.get(session_id)?;
            if !now.is_before(&entry.last_seen.plus_secs(ttl)) {
                return None;
            }
            let stale = !now.is_before(&entry.last_seen.plus_secs(ttl / 2));
            (entry.variant.clone(), stale)
        };
        if stale {
            self.enroll(id, session_id, &name, now);
        }
        Some(name)
    }

    fn enroll(&self, id: &ExperimentId, session_id: &SessionId, variant: &str, now: Timestamp) {
        let mut enrollments = self.enrollments.write().unwrap_or_else(PoisonError::into_inner);
        let sessions = enrollments.entry(id.clone()).or_default();
        sessions.insert(
            session_id.clone(),
            Enrollment {
                variant: variant.to_string(),
                last_seen: now,
            },
        );
        if sessions.len() > self.max_enrollments {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, e)| e.last_seen)
                .map(|(session, _)| session.clone());
            if let Some(oldest) = oldest {
                sessions.remove(&oldest);
                tracing::debug!(experiment_id = %id, "Enrollment limit reached, evicted oldest session");
            }
        }
    }

    /// Assignments for every serving experiment that targets the session's
    /// country and (when known) dominant emotion.
    pub fn active_assignments(
        &self,
        session_id: &SessionId,
        country: &CountryCode,
        emotion: Option<Emotion>,
    ) -> Vec<VariantAssignment> {
        let now = Timestamp::now();
        let experiments = self.experiments.read().unwrap_or_else(PoisonError::into_inner);
        experiments
            .values()
            .filter(|e| e.status.serves_existing_sessions())
            .filter(|e| e.targets_emotion(emotion))
            .filter_map(|e| {
                self.assign_within(e, session_id, country, now)
                    .map(|variant| VariantAssignment {
                        experiment_id: e.id.clone(),
                        variant,
                    })
            })
            .collect()
    }

    /// Stores aggregated results on the experiments they belong to.
    pub async fn record_results(&self, results: BTreeMap<ExperimentId, ExperimentResults>) {
        let mut updated = Vec::new();
        {
            let mut experiments = self.experiments.write().unwrap_or_else(PoisonError::into_inner);
            for (id, result) in results {
                if let Some(experiment) = experiments.get_mut(&id) {
                    experiment.results = Some(result);
                    updated.push(experiment.clone());
                }
            }
        }
        for experiment in &updated {
            self.persist(experiment).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryExperimentRepository;
    use crate::domain::experiment::{TrafficAllocation, VariantResult};
    use crate::domain::foundation::Percentage;
    use proptest::prelude::*;

    fn code(s: &str) -> CountryCode {
        CountryCode::new(s).unwrap()
    }

    fn experiment(id: &str) -> Experiment {
        Experiment::new(
            ExperimentId::new(id).unwrap(),
            "Test",
            vec![Variant::new("A", vec![]), Variant::new("B", vec![])],
            vec![
                TrafficAllocation::new("A", Percentage::new(50)),
                TrafficAllocation::new("B", Percentage::new(50)),
            ],
        )
        .with_target_countries([code("US"), code("CA")])
    }

    async fn running_manager() -> (ExperimentManager, Arc<InMemoryExperimentRepository>, ExperimentId) {
        let repo = Arc::new(InMemoryExperimentRepository::default());
        let manager = ExperimentManager::new(repo.clone());
        let created = manager.create(experiment("exp")).await.unwrap();
        manager.start(&created.id).await.unwrap();
        (manager, repo, created.id)
    }

    #[tokio::test]
    async fn transitions_are_persisted() {
        let (manager, repo, id) = running_manager().await;
        assert_eq!(repo.all()[0].status, ExperimentStatus::Running);

        manager.pause(&id).await.unwrap();
        assert_eq!(repo.all()[0].status, ExperimentStatus::Paused);
    }

    #[tokio::test]
    async fn failed_save_keeps_transition() {
        let (manager, repo, id) = running_manager().await;
        repo.set_failing(true);
        manager.pause(&id).await.unwrap();
        assert_eq!(manager.get(&id).unwrap().status, ExperimentStatus::Paused);
    }

    #[tokio::test]
    async fn create_rejects_bad_allocation() {
        let repo = Arc::new(InMemoryExperimentRepository::default());
        let manager = ExperimentManager::new(repo);
        let mut bad = experiment("bad");
        bad.traffic_allocation[0].percentage = Percentage::new(40);

        let err = manager.create(bad).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidExperimentConfig);
    }

    #[tokio::test]
    async fn unknown_experiment_errors() {
        let manager = ExperimentManager::new(Arc::new(InMemoryExperimentRepository::default()));
        let err = manager.start(&ExperimentId::new("nope").unwrap()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ExperimentNotFound);
        assert!(manager
            .assign(&ExperimentId::new("nope").unwrap(), &SessionId::new("s").unwrap(), &code("US"))
            .is_none());
    }

    #[tokio::test]
    async fn assign_respects_targeting_and_status() {
        let (manager, _, id) = running_manager().await;
        let session = SessionId::new("s-1").unwrap();

        assert!(manager.assign(&id, &session, &code("US")).is_some());
        assert!(manager.assign(&id, &session, &code("JP")).is_none());

        manager.pause(&id).await.unwrap();
        assert!(manager.assign(&id, &session, &code("US")).is_none());
    }

    #[tokio::test]
    async fn completed_experiment_serves_only_enrolled_sessions() {
        let (manager, _, id) = running_manager().await;
        let enrolled = SessionId::new("enrolled").unwrap();
        let before = manager.assign(&id, &enrolled, &code("US")).unwrap();

        manager.complete(&id).await.unwrap();

        let after = manager.assign(&id, &enrolled, &code("US")).unwrap();
        assert_eq!(before.name, after.name);
        assert!(manager
            .assign(&id, &SessionId::new("newcomer").unwrap(), &code("US"))
            .is_none());

        manager.archive(&id).await.unwrap();
        assert!(manager.assign(&id, &enrolled, &code("US")).is_none());
    }

    #[tokio::test]
    async fn completed_stickiness_survives_purge_of_unrelated_sessions() {
        let (manager, _, id) = running_manager().await;
        let manager = manager.with_enrollment_limits(Duration::from_secs(60), 100);
        let experiment = manager.get(&id).unwrap();
        let t0 = Timestamp::from_unix_secs(1_700_000_000);

        let enrolled = SessionId::new("enrolled").unwrap();
        let before = manager
            .assign_within(&experiment, &enrolled, &code("US"), t0)
            .unwrap();
        for i in 0..5 {
            let session = SessionId::new(format!("passing-{}", i)).unwrap();
            manager.assign_within(&experiment, &session, &code("US"), t0);
        }
        assert_eq!(manager.enrollment_count(), 6);

        // Seen again past half the TTL, which refreshes the enrollment.
        manager.assign_within(&experiment, &enrolled, &code("US"), t0.plus_secs(40));

        manager.complete(&id).await.unwrap();
        let completed = manager.get(&id).unwrap();
        assert_eq!(manager.purge_expired_enrollments(t0.plus_secs(70)), 5);
        assert_eq!(manager.enrollment_count(), 1);

        let after = manager
            .assign_within(&completed, &enrolled, &code("US"), t0.plus_secs(70))
            .unwrap();
        assert_eq!(before.name, after.name);
        assert!(manager
            .assign_within(&completed, &SessionId::new("passing-0").unwrap(), &code("US"), t0.plus_secs(70))
            .is_none());
    }

    #[tokio::test]
    async fn enrollments_are_capped_per_experiment() {
        let (manager, _, id) = running_manager().await;
        let manager = manager.with_enrollment_limits(Duration::from_secs(600), 2);
        let experiment = manager.get(&id).unwrap();
        let t0 = Timestamp::from_unix_secs(1_700_000_000);

        for i in 0..3u64 {
            let session = SessionId::new(format!("s-{}", i)).unwrap();
            manager.assign_within(&experiment, &session, &code("US"), t0.plus_secs(i));
        }
        assert_eq!(manager.enrollment_count(), 2);
        assert!(manager
            .enrolled_variant(&id, &SessionId::new("s-0").unwrap(), t0.plus_secs(3))
            .is_none());
        assert!(manager
            .enrolled_variant(&id, &SessionId::new("s-2").unwrap(), t0.plus_secs(3))
            .is_some());
    }

    #[tokio::test]
    async fn repeat_assignment_does_not_grow_enrollments() {
        let (manager, _, id) = running_manager().await;
        let session = SessionId::new("s").unwrap();
        for _ in 0..10 {
            manager.assign(&id, &session, &code("US"));
        }
        assert_eq!(manager.enrollment_count(), 1);
    }

    #[tokio::test]
    async fn active_assignments_filter_by_emotion() {
        let repo = Arc::new(InMemoryExperimentRepository::default());
        let manager = ExperimentManager::new(repo);
        let created = manager
            .create(experiment("anxious").with_target_emotions([Emotion::Anxiety]))
            .await
            .unwrap();
        manager.start(&created.id).await.unwrap();
        let session = SessionId::new("s").unwrap();

        assert!(manager
            .active_assignments(&session, &code("US"), Some(Emotion::Trust))
            .is_empty());
        assert!(manager.active_assignments(&session, &code("US"), None).is_empty());
        assert_eq!(
            manager
                .active_assignments(&session, &code("US"), Some(Emotion::Anxiety))
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn load_reads_repository() {
        let repo = Arc::new(InMemoryExperimentRepository::new(vec![experiment("a"), experiment("b")]));
        let manager = ExperimentManager::new(repo);
        assert_eq!(manager.load().await.unwrap(), 2);
        assert_eq!(manager.list(Some(ExperimentStatus::Draft)).len(), 2);
    }

    #[tokio::test]
    async fn record_results_attaches_to_experiment() {
        let (manager, repo, id) = running_manager().await;
        let mut variants = BTreeMap::new();
        variants.insert("A".to_string(), VariantResult::new(10, 2, None));
        let mut results = BTreeMap::new();
        results.insert(id.clone(), ExperimentResults::from_variants(variants, Timestamp::now()));

        manager.record_results(results).await;
        assert!(manager.get(&id).unwrap().results.is_some());
        assert!(repo.all()[0].results.is_some());
    }

    proptest! {
        #[test]
        fn assignment_is_idempotent(session in "[a-zA-Z0-9-]{1,40}") {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let (manager, _, id) = rt.block_on(running_manager());
            let session = SessionId::new(session).unwrap();

            let first = manager.assign(&id, &session, &code("CA")).map(|v| v.name);
            let second = manager.assign(&id, &session, &code("CA")).map(|v| v.name);
            prop_assert!(first.is_some());
            prop_assert_eq!(first, second);
        }
    }
}
