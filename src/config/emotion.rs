//! Emotion analysis configuration

use serde::Deserialize;
use std::collections::HashMap;

use super::error::ValidationError;
use crate::domain::emotion::EmotionSettings;
use crate::domain::foundation::CountryCode;

/// Tunables for the emotion analyzer
#[derive(Debug, Clone, Deserialize)]
pub struct EmotionConfig {
    /// Score multiplier per country code, e.g. `US = 1.1`
    #[serde(default = "default_intensity_modifiers")]
    pub intensity_modifiers: HashMap<String, f64>,

    #[serde(default = "default_neutral_intensity")]
    pub neutral_intensity: f64,

    #[serde(default = "default_neutral_confidence")]
    pub neutral_confidence: f64,
}

impl EmotionConfig {
    /// Validate emotion configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (country, modifier) in &self.intensity_modifiers {
            CountryCode::new(country)
                .map_err(|_| ValidationError::InvalidCountryCode(country.clone()))?;
            if *modifier <= 0.0 || *modifier > 2.0 {
                return Err(ValidationError::InvalidIntensityModifier(country.clone()));
            }
        }
        if !(0.0..=1.0).contains(&self.neutral_intensity) {
            return Err(ValidationError::InvalidFraction("emotion.neutral_intensity"));
        }
        if !(0.0..=1.0).contains(&self.neutral_confidence) {
            return Err(ValidationError::InvalidFraction("emotion.neutral_confidence"));
        }
        Ok(())
    }

    /// Analyzer settings. Keys that are not valid country codes are
    /// skipped; [`validate`](Self::validate) reports them.
    pub fn to_settings(&self) -> EmotionSettings {
        let intensity_modifiers = self
            .intensity_modifiers
            .iter()
            .filter_map(|(country, modifier)| {
                CountryCode::new(country).ok().map(|code| (code, *modifier))
            })
            .collect();
        EmotionSettings {
            intensity_modifiers,
            neutral_intensity: self.neutral_intensity,
            neutral_confidence: self.neutral_confidence,
        }
    }
}

impl Default for EmotionConfig {
    fn default() -> Self {
        Self {
            intensity_modifiers: default_intensity_modifiers(),
            neutral_intensity: default_neutral_intensity(),
            neutral_confidence: default_neutral_confidence(),
        }
    }
}

fn default_intensity_modifiers() -> HashMap<String, f64> {
    HashMap::from([("US".to_string(), 1.1), ("JP".to_string(), 0.8)])
}

fn default_neutral_intensity() -> f64 {
    0.5
}

fn default_neutral_confidence() -> f64 {
    0.3
}
