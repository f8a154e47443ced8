//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `CULTURE_ENGINE` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use cultural_personalization::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Catalog directory: {}", config.registry.data_dir.display());
//! ```

mod analytics;
mod detection;
mod emotion;
mod error;
mod registry;
mod runtime;

pub use analytics::AnalyticsConfig;
pub use detection::DetectionConfig;
pub use emotion::EmotionConfig;
pub use error::{ConfigError, ValidationError};
pub use registry::RegistryConfig;
pub use runtime::{Environment, LogFormat, RuntimeConfig};

use serde::Deserialize;

use crate::application::EngineSettings;

/// Root application configuration
///
/// Every section has defaults, so an empty environment yields a runnable
/// configuration. Load using [`AppConfig::load()`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Environment and logging
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Signal fusion, session cache and geolocation
    #[serde(default)]
    pub detection: DetectionConfig,

    /// Emotion analyzer tunables
    #[serde(default)]
    pub emotion: EmotionConfig,

    /// Catalog location and refresh
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Analytics queue and feedback loop
    #[serde(default)]
    pub analytics: AnalyticsConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `CULTURE_ENGINE` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `CULTURE_ENGINE__REGISTRY__DATA_DIR=/srv/catalog` -> `registry.data_dir`
    /// - `CULTURE_ENGINE__DETECTION__WEIGHTS__IP=0.25` -> `detection.weights.ip`
    /// - `CULTURE_ENGINE__EMOTION__INTENSITY_MODIFIERS__BR=1.2` -> modifier for BR
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("CULTURE_ENGINE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for the first invalid value found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.detection.validate()?;
        self.emotion.validate()?;
        self.registry.validate()?;
        self.analytics.validate()?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.runtime.is_production()
    }

    /// Engine settings drawn from the detection and registry sections.
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            weights: self.detection.weights,
            fallback_confidence: self.detection.fallback_confidence,
            cache_ttl: self.detection.cache_ttl(),
            serve_staging_rules: self.registry.serve_staging_rules,
        }
    }
}
