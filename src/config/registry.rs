//! Registry configuration

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use super::error::ValidationError;
use crate::application::RegistrySettings;
use crate::domain::foundation::CountryCode;

/// Catalog location and refresh behavior
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// Directory holding profiles.yaml, rules.yaml and experiments.yaml
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,

    /// Bound on each catalog read
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,

    /// Country whose profile serves unknown regions
    #[serde(default = "default_fallback_country")]
    pub fallback_country: String,

    /// Serve staging-phase rules (preview environments only)
    #[serde(default)]
    pub serve_staging_rules: bool,
}

impl RegistryConfig {
    pub fn fallback_country(&self) -> Result<CountryCode, ValidationError> {
        CountryCode::new(&self.fallback_country)
            .map_err(|_| ValidationError::InvalidCountryCode(self.fallback_country.clone()))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Validate registry configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(ValidationError::MissingRequired("registry.data_dir"));
        }
        if self.refresh_interval_secs == 0 {
            return Err(ValidationError::InvalidDuration("registry.refresh_interval_secs"));
        }
        if self.timeout_ms == 0 {
            return Err(ValidationError::InvalidDuration("registry.timeout_ms"));
        }
        self.fallback_country()?;
        Ok(())
    }

    pub fn to_settings(&self) -> Result<RegistrySettings, ValidationError> {
        Ok(RegistrySettings {
            refresh_interval: Duration::from_secs(self.refresh_interval_secs),
            timeout: self.timeout(),
            fallback_country: self.fallback_country()?,
        })
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            refresh_interval_secs: default_refresh_interval(),
            timeout_ms: default_timeout(),
            fallback_country: default_fallback_country(),
            serve_staging_rules: false,
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_refresh_interval() -> u64 {
    300
}

fn default_timeout() -> u64 {
    2000
}

fn default_fallback_country() -> String {
    "US".to_string()
}
