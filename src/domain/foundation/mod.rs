//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers, and error types that form the
//! vocabulary of the personalization domain.

mod errors;
mod ids;
mod percentage;
mod state_machine;
mod timestamp;
mod unit_interval;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{CountryCode, EventId, ExperimentId, RuleId, SessionId};
pub use percentage::Percentage;
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
pub use unit_interval::UnitInterval;
