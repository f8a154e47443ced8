//! Experiment aggregate: variants, traffic split and lifecycle.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

use super::bucketing::{bucket_for, select_variant};
use super::status::ExperimentStatus;
use crate::domain::emotion::Emotion;
use crate::domain::foundation::{
    CountryCode, DomainError, ErrorCode, ExperimentId, Percentage, SessionId, StateMachine,
    Timestamp,
};
use crate::domain::personalization::UXAdaptation;

/// One treatment within an experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub adaptations: Vec<UXAdaptation>,
}

impl Variant {
    pub fn new(name: impl Into<String>, adaptations: Vec<UXAdaptation>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            adaptations,
        }
    }
}

/// Share of traffic routed to a variant. Declaration order fixes the
/// bucket ranges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficAllocation {
    pub variant: String,
    pub percentage: Percentage,
}

impl TrafficAllocation {
    pub fn new(variant: impl Into<String>, percentage: Percentage) -> Self {
        Self {
            variant: variant.into(),
            percentage,
        }
    }
}

/// A session's variant in a running experiment.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantAssignment {
    pub experiment_id: ExperimentId,
    pub variant: Variant,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariantResult {
    pub sessions: u64,
    pub conversions: u64,
    pub conversion_rate: f64,
    /// Mean of 1-5 ratings, absent when nobody rated.
    #[serde(default)]
    pub mean_satisfaction: Option<f64>,
}

impl VariantResult {
    pub fn new(sessions: u64, conversions: u64, mean_satisfaction: Option<f64>) -> Self {
        let conversion_rate = if sessions == 0 {
            0.0
        } else {
            conversions as f64 / sessions as f64
        };
        Self {
            sessions,
            conversions,
            conversion_rate,
            mean_satisfaction,
        }
    }
}

/// Aggregated outcome, recomputed by the feedback loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentResults {
    pub variants: BTreeMap<String, VariantResult>,
    /// Highest conversion rate among variants with traffic; ties go to the
    /// lexicographically smallest name.
    pub leading_variant: Option<String>,
    pub computed_at: Timestamp,
}

impl ExperimentResults {
    pub fn from_variants(variants: BTreeMap<String, VariantResult>, computed_at: Timestamp) -> Self {
        let mut leading: Option<(&String, f64)> = None;
        for (name, result) in &variants {
            if result.sessions == 0 {
                continue;
            }
            match leading {
                Some((_, best)) if result.conversion_rate <= best => {}
                _ => leading = Some((name, result.conversion_rate)),
            }
        }
        let leading_variant = leading.map(|(name, _)| name.clone());
        Self {
            variants,
            leading_variant,
            computed_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    pub id: ExperimentId,
    pub name: String,
    /// Empty means every country.
    #[serde(default)]
    pub target_countries: BTreeSet<CountryCode>,
    /// Empty means any emotion.
    #[serde(default)]
    pub target_emotions: BTreeSet<Emotion>,
    pub variants: Vec<Variant>,
    pub traffic_allocation: Vec<TrafficAllocation>,
    #[serde(default)]
    pub status: ExperimentStatus,
    #[serde(default)]
    pub cultural_hypothesis: String,
    #[serde(default)]
    pub metrics: Vec<String>,
    #[serde(default)]
    pub results: Option<ExperimentResults>,
    #[serde(default)]
    pub started_at: Option<Timestamp>,
    #[serde(default)]
    pub completed_at: Option<Timestamp>,
}

impl Experiment {
    /// Creates a draft experiment.
    pub fn new(
        id: ExperimentId,
        name: impl Into<String>,
        variants: Vec<Variant>,
        traffic_allocation: Vec<TrafficAllocation>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            target_countries: BTreeSet::new(),
            target_emotions: BTreeSet::new(),
            variants,
            traffic_allocation,
            status: ExperimentStatus::Draft,
            cultural_hypothesis: String::new(),
            metrics: Vec::new(),
            results: None,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn with_target_countries(mut self, countries: impl IntoIterator<Item = CountryCode>) -> Self {
        self.target_countries = countries.into_iter().collect();
        self
    }

    pub fn with_target_emotions(mut self, emotions: impl IntoIterator<Item = Emotion>) -> Self {
        self.target_emotions = emotions.into_iter().collect();
        self
    }

    fn invalid(&self, message: impl Into<String>) -> DomainError {
        DomainError::new(ErrorCode::InvalidExperimentConfig, message)
            .with_detail("experiment_id", self.id.as_str())
    }

    /// Sum of all allocations.
    pub fn allocation_total(&self) -> u32 {
        self.traffic_allocation
            .iter()
            .map(|a| u32::from(a.percentage.value()))
            .sum()
    }

    /// Structural checks: named, variants unique and fully allocated,
    /// allocations summing to exactly 100.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(self.invalid("experiment name cannot be empty"));
        }
        if self.variants.is_empty() {
            return Err(self.invalid("experiment must declare at least one variant"));
        }

        let mut names = HashSet::new();
        for variant in &self.variants {
            if variant.name.trim().is_empty() {
                return Err(self.invalid("variant name cannot be empty"));
            }
            if !names.insert(variant.name.as_str()) {
                return Err(self.invalid(format!("duplicate variant '{}'", variant.name)));
            }
        }

        let mut allocated = HashSet::new();
        for allocation in &self.traffic_allocation {
            if !names.contains(allocation.variant.as_str()) {
                return Err(self.invalid(format!(
                    "allocation references unknown variant '{}'",
                    allocation.variant
                )));
            }
            if !allocated.insert(allocation.variant.as_str()) {
                return Err(self.invalid(format!(
                    "variant '{}' is allocated more than once",
                    allocation.variant
                )));
            }
        }
        if let Some(missing) = self.variants.iter().find(|v| !allocated.contains(v.name.as_str())) {
            return Err(self.invalid(format!("variant '{}' has no traffic allocation", missing.name)));
        }

        let total = self.allocation_total();
        if total != 100 {
            return Err(self
                .invalid(format!("traffic allocation sums to {}, expected 100", total))
                .with_detail("allocation_total", total.to_string()));
        }
        Ok(())
    }

    fn transition(&mut self, target: ExperimentStatus) -> Result<(), DomainError> {
        self.status = self
            .status
            .transition_to(target)
            .map_err(|e| e.with_detail("experiment_id", self.id.as_str()))?;
        Ok(())
    }

    /// draft -> running. Rejected unless the configuration is valid.
    pub fn start(&mut self, at: Timestamp) -> Result<(), DomainError> {
        if self.status != ExperimentStatus::Draft {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!("Cannot start experiment in status {}", self.status),
            )
            .with_detail("experiment_id", self.id.as_str()));
        }
        self.validate()?;
        self.transition(ExperimentStatus::Running)?;
        self.started_at = Some(at);
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), DomainError> {
        self.transition(ExperimentStatus::Paused)
    }

    pub fn resume(&mut self) -> Result<(), DomainError> {
        if self.status != ExperimentStatus::Paused {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!("Cannot resume experiment in status {}", self.status),
            )
            .with_detail("experiment_id", self.id.as_str()));
        }
        self.transition(ExperimentStatus::Running)
    }

    /// Freezes bucketing of new sessions.
    pub fn complete(&mut self, at: Timestamp) -> Result<(), DomainError> {
        self.transition(ExperimentStatus::Completed)?;
        self.completed_at = Some(at);
        Ok(())
    }

    pub fn archive(&mut self) -> Result<(), DomainError> {
        self.transition(ExperimentStatus::Archived)
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

    pub fn variant(&self, name: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.name == name)
    }

    /// Variant the session hashes into, ignoring status and targeting.
    pub fn bucket(&self, session_id: &SessionId) -> Option<&Variant> {
        let bucket = bucket_for(&self.id, session_id);
        select_variant(&self.traffic_allocation, bucket).and_then(|name| self.variant(name))
    }

    /// Bucketing for a new session: only running experiments targeting the
    /// country assign a variant.
    pub fn assign(&self, session_id: &SessionId, country: &CountryCode) -> Option<&Variant> {
        if !self.status.accepts_new_sessions() || !self.targets_country(country) {
            return None;
        }
        self.bucket(session_id)
    }
}
