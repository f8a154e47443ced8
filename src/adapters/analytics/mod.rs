//! Analytics pipeline adapters.

mod queued_sink;

pub use queued_sink::{AnalyticsWorker, QueuedAnalyticsSink, QueuedSinkConfig};
