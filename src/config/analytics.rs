//! Analytics and feedback loop configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::adapters::analytics::QueuedSinkConfig;
use crate::application::FeedbackSettings;
use crate::domain::analytics::AdjustmentSettings;

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsConfig {
    /// Events buffered before new ones are dropped
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Bound on each analytics write
    #[serde(default = "default_write_timeout")]
    pub write_timeout_ms: u64,

    #[serde(default = "default_aggregation_interval")]
    pub aggregation_interval_secs: u64,

    /// Sessions with feedback a rule needs before its confidence moves
    #[serde(default = "default_min_samples")]
    pub min_samples: u64,

    /// Largest relative confidence change per aggregation run
    #[serde(default = "default_max_step")]
    pub max_adjustment_step: f64,

    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,

    #[serde(default = "default_max_confidence")]
    pub max_confidence: f64,

    /// Events retained for aggregation
    #[serde(default = "default_max_events")]
    pub max_retained_events: usize,

    /// Sessions remembered per experiment for post-completion stickiness
    #[serde(default = "default_max_enrollments")]
    pub max_enrollments: usize,
}

impl AnalyticsConfig {
    /// Validate analytics configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.queue_capacity == 0 || self.max_retained_events == 0 || self.max_enrollments == 0 {
            return Err(ValidationError::InvalidQueueCapacity);
        }
        if self.write_timeout_ms == 0 {
            return Err(ValidationError::InvalidDuration("analytics.write_timeout_ms"));
        }
        if self.aggregation_interval_secs == 0 {
            return Err(ValidationError::InvalidDuration("analytics.aggregation_interval_secs"));
        }
        if self.max_adjustment_step <= 0.0 || self.max_adjustment_step >= 1.0 {
            return Err(ValidationError::InvalidAdjustmentStep);
        }
        if self.min_confidence <= 0.0
            || self.min_confidence > self.max_confidence
            || self.max_confidence > 1.0
        {
            return Err(ValidationError::InvalidConfidenceBounds);
        }
        Ok(())
    }

    pub fn sink_config(&self) -> QueuedSinkConfig {
        QueuedSinkConfig {
            capacity: self.queue_capacity,
            write_timeout: Duration::from_millis(self.write_timeout_ms),
        }
    }

    pub fn feedback_settings(&self) -> FeedbackSettings {
        FeedbackSettings {
            interval: Duration::from_secs(self.aggregation_interval_secs),
            adjustment: AdjustmentSettings {
                min_samples: self.min_samples,
                max_step: self.max_adjustment_step,
                min_confidence: self.min_confidence,
                max_confidence: self.max_confidence,
            },
            max_events: self.max_retained_events,
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            write_timeout_ms: default_write_timeout(),
            aggregation_interval_secs: default_aggregation_interval(),
            min_samples: default_min_samples(),
            max_adjustment_step: default_max_step(),
            min_confidence: default_min_confidence(),
            max_confidence: default_max_confidence(),
            max_retained_events: default_max_events(),
            max_enrollments: default_max_enrollments(),
        }
    }
}

fn default_queue_capacity() -> usize {
    10_000
}

fn default_write_timeout() -> u64 {
    500
}

fn default_aggregation_interval() -> u64 {
    900
}

fn default_min_samples() -> u64 {
    20
}

fn default_max_step() -> f64 {
    0.2
}

fn default_min_confidence() -> f64 {
    0.1
}

fn default_max_confidence() -> f64 {
    1.0
}

fn default_max_events() -> usize {
    100_000
}

fn default_max_enrollments() -> usize {
    100_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analytics_defaults_match_runtime_defaults() {
        let config = AnalyticsConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.feedback_settings(), FeedbackSettings::default());
        assert_eq!(config.sink_config().capacity, 10_000);
    }

    #[test]
    fn test_rejects_inverted_bounds() {
        let config = AnalyticsConfig {
            min_confidence: 0.8,
            max_confidence: 0.5,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidConfidenceBounds));
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let config = AnalyticsConfig {
            queue_capacity: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidQueueCapacity));
    }
}
