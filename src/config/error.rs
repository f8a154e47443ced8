//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Detection weight '{0}' must be between 0 and 1")]
    InvalidWeight(&'static str),

    #[error("At least one detection weight must be positive")]
    AllWeightsZero,

    #[error("'{0}' must be between 0 and 1")]
    InvalidFraction(&'static str),

    #[error("Duration '{0}' must be greater than zero")]
    InvalidDuration(&'static str),

    #[error("Invalid country code: {0}")]
    InvalidCountryCode(String),

    #[error("Intensity modifier for {0} must be in (0, 2]")]
    InvalidIntensityModifier(String),

    #[error("Confidence bounds must satisfy 0 < min <= max <= 1")]
    InvalidConfidenceBounds,

    #[error("Adjustment step must be in (0, 1)")]
    InvalidAdjustmentStep,

    #[error("Analytics queue capacity must be greater than zero")]
    InvalidQueueCapacity,

    #[error("Geolocation endpoint must be an http(s) URL")]
    InvalidGeoEndpoint,
}
