//! Detection module - Country resolution from weighted signals.

mod fusion;
mod locale;
mod result;
mod signal;

pub use fusion::{MultiSignalDetector, SignalFusion};
pub use locale::{parse_locale, LocaleClaim};
pub use result::DetectionResult;
pub use signal::{DetectionMethod, DetectionSignal, MethodWeights};
