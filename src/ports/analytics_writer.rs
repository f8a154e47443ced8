//! AnalyticsWriter port - Append-only persistence for events and feedback.

use async_trait::async_trait;

use crate::domain::analytics::{AnalyticsEvent, UserFeedback};
use crate::domain::foundation::DomainError;

/// Port for durably appending analytics records.
///
/// Records are never updated or deleted through this port.
#[async_trait]
pub trait AnalyticsWriter: Send + Sync {
    async fn append_analytics_event(&self, event: &AnalyticsEvent) -> Result<(), DomainError>;

    async fn append_feedback(&self, feedback: &UserFeedback) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time check that trait is object-safe
    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn AnalyticsWriter) {}
}
