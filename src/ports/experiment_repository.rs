//! ExperimentRepository port - Persistence for experiments.

use async_trait::async_trait;

use crate::domain::experiment::{Experiment, ExperimentStatus};
use crate::domain::foundation::DomainError;

/// Port for loading and saving experiments.
#[async_trait]
pub trait ExperimentRepository: Send + Sync {
    /// Load experiments, optionally only those in the given status.
    async fn load_experiments(
        &self,
        status: Option<ExperimentStatus>,
    ) -> Result<Vec<Experiment>, DomainError>;

    /// Insert or replace an experiment by id.
    async fn save(&self, experiment: &Experiment) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time check that trait is object-safe
    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn ExperimentRepository) {}
}
