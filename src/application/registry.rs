//! CulturalProfileRegistry - In-memory profiles and rules.
//!
//! Loaded at boot and on a refresh interval from the culture store. Each
//! refresh builds a complete new snapshot and swaps it in; a failed or
//! timed-out refresh keeps serving the last good snapshot. Refreshes and
//! confidence updates publish snapshots one at a time.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;

use crate::application::snapshot::SnapshotCell;
use crate::domain::analytics::RuleAdjustment;
use crate::domain::culture::CulturalProfile;
use crate::domain::foundation::{CountryCode, DomainError, RuleId, Timestamp, UnitInterval};
use crate::domain::personalization::PersonalizationRule;
use crate::ports::CultureStore;

#[derive(Debug, Clone)]
pub struct RegistrySettings {
    pub refresh_interval: Duration,
    /// Bound on each culture-store call.
    pub timeout: Duration,
    /// Country whose profile serves unknown regions.
    pub fallback_country: CountryCode,
}

impl RegistrySettings {
    pub fn new(fallback_country: CountryCode) -> Self {
        Self {
            refresh_interval: Duration::from_secs(300),
            timeout: Duration::from_millis(2000),
            fallback_country,
        }
    }
}

/// One consistent view of the catalog.
#[derive(Debug)]
pub struct RegistrySnapshot {
    profiles: HashMap<CountryCode, Arc<CulturalProfile>>,
    fallback: Arc<CulturalProfile>,
    rules: Vec<Arc<PersonalizationRule>>,
    /// Number of successful refreshes; 0 for the boot placeholder.
    pub version: u64,
    pub loaded_at: Timestamp,
}

impl RegistrySnapshot {
    fn empty(fallback_country: &CountryCode) -> Self {
        Self {
            profiles: HashMap::new(),
            fallback: Arc::new(CulturalProfile::generic(fallback_country.clone())),
            rules: Vec::new(),
            version: 0,
            loaded_at: Timestamp::now(),
        }
    }

    pub fn profile(&self, country: &CountryCode) -> Option<Arc<CulturalProfile>> {
        self.profiles.get(country).cloned()
    }

    pub fn fallback(&self) -> Arc<CulturalProfile> {
        self.fallback.clone()
    }

    pub fn rules(&self) -> &[Arc<PersonalizationRule>] {
        &self.rules
    }

    pub fn profile_count(&self) -> usize {
        self.profiles.len()
    }
}

/// Outcome of a refresh that succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshSummary {
    pub version: u64,
    pub profiles: usize,
    pub rules: usize,
    pub rejected_rules: usize,
}

pub struct CulturalProfileRegistry {
    store: Arc<dyn CultureStore>,
    settings: RegistrySettings,
    snapshot: SnapshotCell<RegistrySnapshot>,
    // Raw rules from the last successful load, kept so confidence overrides
    // can be re-applied without another store round trip.
    base_rules: RwLock<Vec<PersonalizationRule>>,
    confidence_overrides: RwLock<HashMap<RuleId, f64>>,
    // Held from loading the current snapshot until its replacement is stored.
    publish: Mutex<()>,
}

impl CulturalProfileRegistry {
    /// Starts with only the generic fallback profile; call
    /// [`refresh`](Self::refresh) to load the catalog.
    pub fn new(store: Arc<dyn CultureStore>, settings: RegistrySettings) -> Self {
        let snapshot = SnapshotCell::new(RegistrySnapshot::empty(&settings.fallback_country));
        Self {
            store,
            settings,
            snapshot,
            base_rules: RwLock::new(Vec::new()),
            confidence_overrides: RwLock::new(HashMap::new()),
            publish: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> &RegistrySettings {
        &self.settings
    }

    /// Current snapshot. Hold it for the duration of a request.
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.snapshot.load()
    }

    /// Profile for the country, or `None` when unknown.
    pub fn get(&self, country: &CountryCode) -> Option<Arc<CulturalProfile>> {
        self.snapshot().profile(country)
    }

    /// Profile for the country, falling back to the default profile.
    pub fn get_or_fallback(&self, country: &CountryCode) -> (Arc<CulturalProfile>, bool) {
        let snapshot = self.snapshot();
        match snapshot.profile(country) {
            Some(profile) => (profile, true),
            None => (snapshot.fallback(), false),
        }
    }

    /// Reloads profiles and rules. On error the previous snapshot stays.
    pub async fn refresh(&self) -> Result<RefreshSummary, DomainError> {
        let profiles = time::timeout(self.settings.timeout, self.store.load_cultural_profiles())
            .await
            .map_err(|_| DomainError::timeout("culture_store"))??;
        let rules = time::timeout(
            self.settings.timeout,
            self.store.load_personalization_rules(false),
        )
        .await
        .map_err(|_| DomainError::timeout("culture_store"))??;

        let summary = {
            let _publishing = self.publish.lock().unwrap_or_else(PoisonError::into_inner);
            let previous_version = self.snapshot().version;
            let (snapshot, rejected) = self.build_snapshot(profiles, &rules, previous_version + 1);
            let summary = RefreshSummary {
                version: snapshot.version,
                profiles: snapshot.profile_count(),
                rules: snapshot.rules.len(),
                rejected_rules: rejected,
            };

            *self.base_rules.write().unwrap_or_else(PoisonError::into_inner) = rules;
            self.snapshot.store(snapshot);
            summary
        };

        tracing::info!(
            version = summary.version,
            profiles = summary.profiles,
            rules = summary.rules,
            rejected_rules = summary.rejected_rules,
            "Cultural registry refreshed"
        );
        Ok(summary)
    }

    /// Refresh that logs instead of failing; returns whether it succeeded.
    pub async fn refresh_or_keep(&self) -> bool {
        match self.refresh().await {
            Ok(_) => true,
            Err(e) => {
                let snapshot = self.snapshot();
                tracing::warn!(
                    error = %e,
                    version = snapshot.version,
                    "Registry refresh failed, serving stale snapshot"
                );
                false
            }
        }
    }

    /// Runs the refresh loop until shutdown is signalled.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.settings.refresh_interval);
        // The first tick completes immediately; boot already refreshed.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("Registry refresh loop stopped");
                        return;
                    }
                }
                _ = interval.tick() => {
                    self.refresh_or_keep().await;
                }
            }
        }
    }

    /// Applies feedback-loop adjustments and republishes the rule set.
    pub fn apply_confidence_adjustments(&self, adjustments: &[RuleAdjustment]) {
        if adjustments.is_empty() {
            return;
        }
        let _publishing = self.publish.lock().unwrap_or_else(PoisonError::into_inner);
        {
            let mut overrides = self
                .confidence_overrides
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            for adjustment in adjustments {
                overrides.insert(adjustment.rule_id.clone(), adjustment.adjusted_confidence);
            }
        }

        let current = self.snapshot();
        let base_rules = self
            .base_rules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let rules = self.effective_rules(&current.profiles, &current.fallback, &base_rules).0;
        self.snapshot.store(RegistrySnapshot {
            profiles: current.profiles.clone(),
            fallback: current.fallback.clone(),
            rules,
            version: current.version,
            loaded_at: current.loaded_at,
        });
        tracing::debug!(adjusted = adjustments.len(), "Rule confidence overrides applied");
    }

    /// Accepted rules as authored, without confidence overrides.
    pub fn authored_rules(&self) -> Vec<PersonalizationRule> {
        let snapshot = self.snapshot();
        let accepted: HashSet<&RuleId> = snapshot.rules.iter().map(|r| &r.id).collect();
        self.base_rules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|rule| accepted.contains(&rule.id))
            .cloned()
            .collect()
    }

    /// Current override for a rule, if the feedback loop has adjusted it.
    pub fn confidence_override(&self, rule_id: &RuleId) -> Option<f64> {
        self.confidence_overrides
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(rule_id)
            .copied()
    }

    fn build_snapshot(
        &self,
        profiles: Vec<CulturalProfile>,
        rules: &[PersonalizationRule],
        version: u64,
    ) -> (RegistrySnapshot, usize) {
        let profiles: HashMap<CountryCode, Arc<CulturalProfile>> = profiles
            .into_iter()
            .map(|p| (p.country_code.clone(), Arc::new(p.normalized())))
            .collect();
        let fallback = profiles
            .get(&self.settings.fallback_country)
            .cloned()
            .unwrap_or_else(|| {
                tracing::warn!(
                    country = %self.settings.fallback_country,
                    "Fallback country has no profile, using generic profile"
                );
                Arc::new(CulturalProfile::generic(self.settings.fallback_country.clone()))
            });

        let (rules, rejected) = self.effective_rules(&profiles, &fallback, rules);
        (
            RegistrySnapshot {
                profiles,
                fallback,
                rules,
                version,
                loaded_at: Timestamp::now(),
            },
            rejected,
        )
    }

    /// Validates rules against the profiles they target and applies
    /// confidence overrides. Rules targeting every country are checked
    /// against the fallback profile.
    fn effective_rules(
        &self,
        profiles: &HashMap<CountryCode, Arc<CulturalProfile>>,
        fallback: &Arc<CulturalProfile>,
        rules: &[PersonalizationRule],
    ) -> (Vec<Arc<PersonalizationRule>>, usize) {
        let overrides = self
            .confidence_overrides
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut accepted = Vec::with_capacity(rules.len());
        let mut rejected = 0;

        for rule in rules {
            let checked = rule.validate().and_then(|_| {
                if rule.target_countries.is_empty() {
                    return rule.validate_against_profile(fallback);
                }
                rule.target_countries
                    .iter()
                    .filter_map(|c| profiles.get(c))
                    .try_for_each(|p| rule.validate_against_profile(p))
            });
            if let Err(e) = checked {
                tracing::warn!(rule_id = %rule.id, error = %e, "Rejecting personalization rule");
                rejected += 1;
                continue;
            }

            let mut rule = rule.clone();
            if let Some(confidence) = overrides.get(&rule.id) {
                rule.confidence = UnitInterval::new(*confidence);
            }
            accepted.push(Arc::new(rule));
        }
        (accepted, rejected)
    }
}
