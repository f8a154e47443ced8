//! Application layer - Service objects with injected collaborators.
//!
//! The engine serves requests; the registry, experiment manager and
//! feedback loop own the shared state it reads and the background jobs
//! that keep that state current.

mod detection_cache;
mod engine;
mod experiments;
mod feedback;
mod registry;
mod signals;
mod snapshot;

pub use detection_cache::DetectionCache;
pub use engine::{EngineSettings, PersonalizationEngine, PersonalizationResponse};
pub use experiments::{ExperimentManager, ExperimentTransition};
pub use feedback::{FeedbackLoop, FeedbackSettings};
pub use registry::{CulturalProfileRegistry, RefreshSummary, RegistrySettings, RegistrySnapshot};
pub use signals::{CountryHint, PersonalizationRequest, SignalCollector, MANUAL_CONFIDENCE};
pub use snapshot::SnapshotCell;
