//! Experiment module - A/B/N tests over adaptation sets.
//!
//! Bucketing is a pure function of `(experiment_id, session_id)`, so a
//! session keeps its variant without any shared state.

mod bucketing;
#[allow(clippy::module_inception)]
mod experiment;
mod status;

pub use bucketing::{bucket_for, select_variant, BUCKETS};
pub use experiment::{
    Experiment, ExperimentResults, TrafficAllocation, Variant, VariantAssignment, VariantResult,
};
pub use status::ExperimentStatus;
