//! Analytics module - Event log records and offline aggregation.

mod aggregator;
mod event;

pub use aggregator::{
    AdjustmentSettings, AggregationReport, CultureStats, FeedbackAggregator, RuleAdjustment,
};
pub use event::{AnalyticsEvent, AnalyticsEventType, EventPayload, UserFeedback};
