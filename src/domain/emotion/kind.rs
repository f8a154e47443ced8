//! The closed set of emotions the engine reasons about.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// An emotional state inferred from behavior or authored in a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Emotion {
    Anxiety,
    Calm,
    Curiosity,
    Excitement,
    Frustration,
    Neutral,
    Trust,
    Urgency,
}

impl Emotion {
    /// Emotions the analyzer scores from telemetry. `Neutral` is the
    /// fallback and never scored directly.
    pub const SCORED: [Emotion; 7] = [
        Emotion::Anxiety,
        Emotion::Calm,
        Emotion::Curiosity,
        Emotion::Excitement,
        Emotion::Frustration,
        Emotion::Trust,
        Emotion::Urgency,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Anxiety => "anxiety",
            Emotion::Calm => "calm",
            Emotion::Curiosity => "curiosity",
            Emotion::Excitement => "excitement",
            Emotion::Frustration => "frustration",
            Emotion::Neutral => "neutral",
            Emotion::Trust => "trust",
            Emotion::Urgency => "urgency",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Emotion {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anxiety" => Ok(Emotion::Anxiety),
            "calm" => Ok(Emotion::Calm),
            "curiosity" => Ok(Emotion::Curiosity),
            "excitement" => Ok(Emotion::Excitement),
            "frustration" => Ok(Emotion::Frustration),
            "neutral" => Ok(Emotion::Neutral),
            "trust" => Ok(Emotion::Trust),
            "urgency" => Ok(Emotion::Urgency),
            other => Err(ValidationError::invalid_format(
                "emotion",
                format!("unknown emotion '{}'", other),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("Trust".parse::<Emotion>().unwrap(), Emotion::Trust);
        assert!("joy".parse::<Emotion>().is_err());
    }

    #[test]
    fn scored_set_excludes_neutral() {
        assert!(!Emotion::SCORED.contains(&Emotion::Neutral));
    }

    #[test]
    fn serializes_as_snake_case() {
        assert_eq!(serde_json::to_string(&Emotion::Curiosity).unwrap(), "\"curiosity\"");
    }
}
