//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the engine to external systems:
//! - `analytics` - Bounded queue and background writer for analytics events
//! - `filesystem` - YAML catalog and JSON-lines analytics log
//! - `geo` - HTTP geolocation
//! - `memory` - In-memory collaborators for tests and local runs

pub mod analytics;
pub mod filesystem;
pub mod geo;
pub mod memory;

pub use analytics::{AnalyticsWorker, QueuedAnalyticsSink, QueuedSinkConfig};
pub use filesystem::{JsonLinesAnalyticsWriter, YamlCatalog};
pub use geo::HttpGeoLocator;
pub use memory::{
    InMemoryAnalyticsWriter, InMemoryCultureStore, InMemoryExperimentRepository, StaticGeoLocator,
};
