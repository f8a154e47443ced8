//! CultureStore port - Read access to authored profiles and rules.
//!
//! Profiles and rules are created by an offline authoring process. The
//! engine only ever reads them, at boot and on each registry refresh.

use async_trait::async_trait;

use crate::domain::culture::CulturalProfile;
use crate::domain::foundation::DomainError;
use crate::domain::personalization::PersonalizationRule;

/// Port for loading the authored culture catalog.
///
/// Implementations must return complete lists; the registry swaps the
/// whole snapshot, so a partial read would drop entries until the next
/// refresh.
#[async_trait]
pub trait CultureStore: Send + Sync {
    /// Load every cultural profile.
    async fn load_cultural_profiles(&self) -> Result<Vec<CulturalProfile>, DomainError>;

    /// Load personalization rules.
    ///
    /// With `active_only`, rules still in the testing or staging phase are
    /// excluded by the store.
    async fn load_personalization_rules(
        &self,
        active_only: bool,
    ) -> Result<Vec<PersonalizationRule>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time check that trait is object-safe
    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn CultureStore) {}
}
