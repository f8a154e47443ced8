//! Detection configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::domain::detection::MethodWeights;

/// Signal fusion, session cache and geolocation settings
#[derive(Debug, Clone, Deserialize)]
pub struct DetectionConfig {
    /// Trust placed in each detection method
    #[serde(default)]
    pub weights: MethodWeights,

    /// Confidence reported when no signal is available
    #[serde(default = "default_fallback_confidence")]
    pub fallback_confidence: f64,

    /// How long a session's detection result is reused
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// Bound on each geolocation lookup
    #[serde(default = "default_geo_timeout")]
    pub geo_timeout_ms: u64,

    /// Base URL of the geolocation service; no ip signal when unset
    pub geo_endpoint: Option<String>,
}

impl DetectionConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn geo_timeout(&self) -> Duration {
        Duration::from_millis(self.geo_timeout_ms)
    }

    /// Validate detection configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        let weights = [
            ("neural_memory", self.weights.neural_memory),
            ("ip", self.weights.ip),
            ("locale", self.weights.locale),
            ("behavior", self.weights.behavior),
            ("manual", self.weights.manual),
        ];
        for (name, weight) in weights {
            if !(0.0..=1.0).contains(&weight) {
                return Err(ValidationError::InvalidWeight(name));
            }
        }
        if weights.iter().all(|(_, w)| *w == 0.0) {
            return Err(ValidationError::AllWeightsZero);
        }
        if !(0.0..=1.0).contains(&self.fallback_confidence) {
            return Err(ValidationError::InvalidFraction("detection.fallback_confidence"));
        }
        if self.cache_ttl_secs == 0 {
            return Err(ValidationError::InvalidDuration("detection.cache_ttl_secs"));
        }
        if self.geo_timeout_ms == 0 {
            return Err(ValidationError::InvalidDuration("detection.geo_timeout_ms"));
        }
        if let Some(endpoint) = &self.geo_endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(ValidationError::InvalidGeoEndpoint);
            }
        }
        Ok(())
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            weights: MethodWeights::default(),
            fallback_confidence: default_fallback_confidence(),
            cache_ttl_secs: default_cache_ttl(),
            geo_timeout_ms: default_geo_timeout(),
            geo_endpoint: None,
        }
    }
}

fn default_fallback_confidence() -> f64 {
    0.5
}

fn default_cache_ttl() -> u64 {
    1800
}

fn default_geo_timeout() -> u64 {
    250
}
