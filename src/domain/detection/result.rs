//! Outcome of resolving a session's cultural context.

use std::sync::Arc;

use super::signal::DetectionMethod;
use crate::domain::culture::CulturalProfile;
use crate::domain::foundation::{CountryCode, Timestamp};
use crate::domain::personalization::{PersonalizationRule, UXAdaptation};

/// Cultural context for one session.
///
/// Profiles and rules are shared with the registry snapshot they were read
/// from, so a result stays consistent even if the registry refreshes.
#[derive(Debug, Clone)]
pub struct DetectionResult {
    pub country_code: CountryCode,
    pub confidence: f64,
    pub method: DetectionMethod,
    pub profile: Arc<CulturalProfile>,
    /// False when no profile exists for the detected country and the
    /// fallback profile is used instead.
    pub profile_resolved: bool,
    /// Rules matching the detected context before emotion analysis.
    pub rules: Vec<Arc<PersonalizationRule>>,
    /// Baseline directives from the matched rules.
    pub adaptations: Vec<UXAdaptation>,
    pub detected_at: Timestamp,
}

impl DetectionResult {
    /// True when nothing was detected and the fallback context was used.
    pub fn is_fallback(&self) -> bool {
        !self.profile_resolved && self.method == DetectionMethod::Manual
    }
}
