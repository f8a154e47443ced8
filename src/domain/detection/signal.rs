//! Detection signals and the weights applied to each detection method.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{CountryCode, Timestamp, UnitInterval, ValidationError};

/// Where a detection signal came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    Ip,
    Locale,
    NeuralMemory,
    Behavior,
    Manual,
}

impl DetectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionMethod::Ip => "ip",
            DetectionMethod::Locale => "locale",
            DetectionMethod::NeuralMemory => "neural_memory",
            DetectionMethod::Behavior => "behavior",
            DetectionMethod::Manual => "manual",
        }
    }
}

impl fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One partially-confident observation about a visitor's country.
/// Ephemeral: created per request and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionSignal {
    pub method: DetectionMethod,
    pub country_code: CountryCode,
    pub confidence: UnitInterval,
    pub observed_at: Timestamp,
}

impl DetectionSignal {
    pub fn new(method: DetectionMethod, country_code: CountryCode, confidence: f64) -> Self {
        Self {
            method,
            country_code,
            confidence: UnitInterval::new(confidence),
            observed_at: Timestamp::now(),
        }
    }
}

/// Trust placed in each detection method. Tunable configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MethodWeights {
    #[serde(default = "default_neural_memory")]
    pub neural_memory: f64,
    #[serde(default = "default_ip")]
    pub ip: f64,
    #[serde(default = "default_locale")]
    pub locale: f64,
    #[serde(default = "default_behavior")]
    pub behavior: f64,
    #[serde(default = "default_manual")]
    pub manual: f64,
}

impl MethodWeights {
    pub fn weight(&self, method: DetectionMethod) -> f64 {
        match method {
            DetectionMethod::NeuralMemory => self.neural_memory,
            DetectionMethod::Ip => self.ip,
            DetectionMethod::Locale => self.locale,
            DetectionMethod::Behavior => self.behavior,
            DetectionMethod::Manual => self.manual,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let all = [
            ("neural_memory", self.neural_memory),
            ("ip", self.ip),
            ("locale", self.locale),
            ("behavior", self.behavior),
            ("manual", self.manual),
        ];
        for (name, weight) in all {
            if !(0.0..=1.0).contains(&weight) {
                return Err(ValidationError::out_of_range(
                    format!("weights.{}", name),
                    0.0,
                    1.0,
                    weight,
                ));
            }
        }
        if all.iter().all(|(_, w)| *w == 0.0) {
            return Err(ValidationError::invalid_format(
                "weights",
                "at least one method weight must be positive",
            ));
        }
        Ok(())
    }
}

impl Default for MethodWeights {
    fn default() -> Self {
        Self {
            neural_memory: default_neural_memory(),
            ip: default_ip(),
            locale: default_locale(),
            behavior: default_behavior(),
            manual: default_manual(),
        }
    }
}

fn default_neural_memory() -> f64 {
    0.4
}

fn default_ip() -> f64 {
    0.3
}

fn default_locale() -> f64 {
    0.2
}

fn default_behavior() -> f64 {
    0.1
}

fn default_manual() -> f64 {
    1.0
}
