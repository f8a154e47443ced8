//! Culture module - Authored knowledge about regions.
//!
//! Profiles are created by an offline authoring process, loaded into the
//! registry and treated as immutable afterwards.

mod emotion_profile;
mod profile;

pub use emotion_profile::{DecisionPattern, EmotionProfile, MessagingTone, UrgencyInterpretation};
pub use profile::{
    CommunicationStyle, CulturalColorMapping, CulturalDimensions, CulturalProfile,
    HofstedeDimension, ImageryRule, ImageryStance, SeasonalAdjustment, SocialProofType,
    TabooElement, TabooSeverity,
};
