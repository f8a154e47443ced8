//! Personalization module - Rules, conditions and adaptation directives.
//!
//! Rules are authored elsewhere and consumed read-only. The generator turns
//! the rules matching a request, any active experiment variants and the
//! cultural profile into one deduplicated list of directives.

mod adaptation;
mod condition;
mod generator;
mod rule;

pub use adaptation::{AdaptationAction, ElementType, UXAdaptation};
pub use condition::{Condition, ConditionField, ConditionOperator, ConditionValue, RuleContext};
pub use generator::{
    AdaptationGenerator, AdaptationPlan, AdaptationSource, GenerationOptions, RationaleEntry,
    RationaleOutcome,
};
pub use rule::{PersonalizationRule, RuleType, TestingPhase, VariantBinding};
