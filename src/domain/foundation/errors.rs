//! Error types for the domain layer.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use thiserror::Error;

/// Errors that occur during value object construction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Field '{field}' cannot be empty")]
    EmptyField { field: String },

    #[error("Field '{field}' must be between {min} and {max}, got {actual}")]
    OutOfRange {
        field: String,
        min: f64,
        max: f64,
        actual: f64,
    },

    #[error("Field '{field}' has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    /// Creates an empty field validation error.
    pub fn empty_field(field: impl Into<String>) -> Self {
        ValidationError::EmptyField { field: field.into() }
    }

    /// Creates an out of range validation error.
    pub fn out_of_range(field: impl Into<String>, min: f64, max: f64, actual: f64) -> Self {
        ValidationError::OutOfRange {
            field: field.into(),
            min,
            max,
            actual,
        }
    }

    /// Creates an invalid format validation error.
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Error codes organized by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Validation errors
    ValidationFailed,
    OutOfRange,
    InvalidFormat,

    // Not found errors
    ProfileNotFound,
    ExperimentNotFound,

    // Authoring errors
    InvalidExperimentConfig,
    InvalidRuleConfig,
    InvalidStateTransition,

    // Collaborator errors
    CollaboratorUnavailable,
    CollaboratorTimeout,

    // Infrastructure errors
    InternalError,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::ValidationFailed => "VALIDATION_FAILED",
            ErrorCode::OutOfRange => "OUT_OF_RANGE",
            ErrorCode::InvalidFormat => "INVALID_FORMAT",
            ErrorCode::ProfileNotFound => "PROFILE_NOT_FOUND",
            ErrorCode::ExperimentNotFound => "EXPERIMENT_NOT_FOUND",
            ErrorCode::InvalidExperimentConfig => "INVALID_EXPERIMENT_CONFIG",
            ErrorCode::InvalidRuleConfig => "INVALID_RULE_CONFIG",
            ErrorCode::InvalidStateTransition => "INVALID_STATE_TRANSITION",
            ErrorCode::CollaboratorUnavailable => "COLLABORATOR_UNAVAILABLE",
            ErrorCode::CollaboratorTimeout => "COLLABORATOR_TIMEOUT",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        };
        write!(f, "{}", s)
    }
}

/// Standard domain error with code, message, and optional details.
#[derive(Debug, Clone)]
pub struct DomainError {
    pub code: ErrorCode,
    pub message: String,
    pub details: HashMap<String, String>,
}

impl DomainError {
    /// Creates a new domain error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: HashMap::new(),
        }
    }

    /// Creates a validation error for a specific field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message).with_detail("field", field.into())
    }

    /// Creates an error for a collaborator that could not be reached.
    pub fn unavailable(collaborator: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CollaboratorUnavailable, message)
            .with_detail("collaborator", collaborator)
    }

    /// Creates an error for a collaborator call that exceeded its deadline.
    pub fn timeout(collaborator: &str) -> Self {
        Self::new(
            ErrorCode::CollaboratorTimeout,
            format!("{} did not respond in time", collaborator),
        )
        .with_detail("collaborator", collaborator)
    }

    /// Adds a detail to the error.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl Error for DomainError {}

impl From<ValidationError> for DomainError {
    fn from(err: ValidationError) -> Self {
        let code = match err {
            ValidationError::OutOfRange { .. } => ErrorCode::OutOfRange,
            ValidationError::InvalidFormat { .. } => ErrorCode::InvalidFormat,
            ValidationError::EmptyField { .. } => ErrorCode::ValidationFailed,
        };
        DomainError::new(code, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_empty_field_displays_correctly() {
        let err = ValidationError::empty_field("country_code");
        assert_eq!(format!("{}", err), "Field 'country_code' cannot be empty");
    }

    #[test]
    fn validation_error_out_of_range_displays_correctly() {
        let err = ValidationError::out_of_range("confidence", 0.0, 1.0, 1.5);
        assert_eq!(
            format!("{}", err),
            "Field 'confidence' must be between 0 and 1, got 1.5"
        );
    }

    #[test]
    fn domain_error_displays_code_and_message() {
        let err = DomainError::new(ErrorCode::ExperimentNotFound, "Experiment not found");
        assert_eq!(format!("{}", err), "[EXPERIMENT_NOT_FOUND] Experiment not found");
    }

    #[test]
    fn unavailable_error_records_collaborator() {
        let err = DomainError::unavailable("geolocation", "connection refused");
        assert_eq!(err.code, ErrorCode::CollaboratorUnavailable);
        assert_eq!(err.details.get("collaborator"), Some(&"geolocation".to_string()));
    }

    #[test]
    fn validation_error_converts_with_matching_code() {
        let err: DomainError = ValidationError::out_of_range("x", 0.0, 1.0, 2.0).into();
        assert_eq!(err.code, ErrorCode::OutOfRange);

        let err: DomainError = ValidationError::invalid_format("x", "bad").into();
        assert_eq!(err.code, ErrorCode::InvalidFormat);
    }

    #[test]
    fn error_code_display_formats_correctly() {
        assert_eq!(
            format!("{}", ErrorCode::InvalidExperimentConfig),
            "INVALID_EXPERIMENT_CONFIG"
        );
        assert_eq!(format!("{}", ErrorCode::InternalError), "INTERNAL_ERROR");
    }
}
