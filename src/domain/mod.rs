//! Domain layer containing the personalization model and its algorithms.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (value objects, IDs, errors, state machine)
//! - `culture` - Cultural profiles and per-emotion profiles
//! - `detection` - Signal fusion and locale parsing
//! - `emotion` - Behavioral telemetry scoring
//! - `personalization` - Rules, conditions and adaptation generation
//! - `experiment` - Experiment lifecycle and bucketing
//! - `analytics` - Events, feedback and aggregation
//!
//! Nothing in here performs I/O.

pub mod analytics;
pub mod culture;
pub mod detection;
pub mod emotion;
pub mod experiment;
pub mod foundation;
pub mod personalization;
