//! In-memory adapters.

mod in_memory_store;
mod static_geo_locator;

pub use in_memory_store::{InMemoryAnalyticsWriter, InMemoryCultureStore, InMemoryExperimentRepository};
pub use static_geo_locator::StaticGeoLocator;
