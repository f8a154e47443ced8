//! Ports - Interfaces for external collaborators.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the engine and the outside world. Adapters implement these ports.
//!
//! ## Persistence Ports
//!
//! - `CultureStore` - Authored cultural profiles and personalization rules
//! - `ExperimentRepository` - Experiment definitions and status
//! - `AnalyticsWriter` - Append-only analytics events and feedback
//!
//! ## Request-path Ports
//!
//! - `GeoLocator` - IP geolocation
//! - `AnalyticsSink` - Non-blocking analytics emission

mod analytics_sink;
mod analytics_writer;
mod culture_store;
mod experiment_repository;
mod geo_locator;

pub use analytics_sink::AnalyticsSink;
pub use analytics_writer::AnalyticsWriter;
pub use culture_store::CultureStore;
pub use experiment_repository::ExperimentRepository;
pub use geo_locator::{GeoLocation, GeoLocator};
