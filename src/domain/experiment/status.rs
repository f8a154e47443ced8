//! ExperimentStatus enum for tracking the lifecycle of experiments.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::StateMachine;

/// Lifecycle status of an experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentStatus {
    #[default]
    Draft,
    Running,
    Paused,
    Completed,
    Archived,
}

impl ExperimentStatus {
    /// Returns true if new sessions may be bucketed.
    pub fn accepts_new_sessions(&self) -> bool {
        matches!(self, ExperimentStatus::Running)
    }

    /// Returns true if sessions bucketed earlier keep their variant.
    pub fn serves_existing_sessions(&self) -> bool {
        matches!(self, ExperimentStatus::Running | ExperimentStatus::Completed)
    }
}

impl StateMachine for ExperimentStatus {
    /// Valid transitions:
    /// - Draft -> Running
    /// - Running -> Paused | Completed
    /// - Paused -> Running | Completed
    /// - Completed -> Archived
    fn can_transition_to(&self, target: &Self) -> bool {
        use ExperimentStatus::*;
        matches!(
            (self, target),
            (Draft, Running)
                | (Running, Paused)
                | (Running, Completed)
                | (Paused, Running)
                | (Paused, Completed)
                | (Completed, Archived)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use ExperimentStatus::*;
        match self {
            Draft => vec![Running],
            Running => vec![Paused, Completed],
            Paused => vec![Running, Completed],
            Completed => vec![Archived],
            Archived => vec![],
        }
    }
}

impl fmt::Display for ExperimentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExperimentStatus::Draft => "draft",
            ExperimentStatus::Running => "running",
            ExperimentStatus::Paused => "paused",
            ExperimentStatus::Completed => "completed",
            ExperimentStatus::Archived => "archived",
        };
        write!(f, "{}", s)
    }
}
