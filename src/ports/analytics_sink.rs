//! AnalyticsSink port - Fire-and-forget event emission.
//!
//! The request path hands events to a sink and never waits for them to be
//! written. Emission is synchronous and must not block.

use crate::domain::analytics::AnalyticsEvent;

/// Port for emitting analytics events from the hot path.
pub trait AnalyticsSink: Send + Sync {
    /// Queue an event. Implementations drop (and log) when they cannot
    /// accept it; the caller is never told.
    fn emit(&self, event: AnalyticsEvent);
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time check that trait is object-safe
    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn AnalyticsSink) {}
}
