//! Append-only analytics events and user feedback.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::detection::DetectionMethod;
use crate::domain::emotion::Emotion;
use crate::domain::foundation::{
    CountryCode, EventId, ExperimentId, RuleId, SessionId, Timestamp, ValidationError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyticsEventType {
    Detect,
    Adapt,
    ExperimentAssign,
    Feedback,
}

impl fmt::Display for AnalyticsEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AnalyticsEventType::Detect => "detect",
            AnalyticsEventType::Adapt => "adapt",
            AnalyticsEventType::ExperimentAssign => "experiment_assign",
            AnalyticsEventType::Feedback => "feedback",
        };
        write!(f, "{}", s)
    }
}

/// Explicit feedback from a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserFeedback {
    pub session_id: SessionId,
    pub converted: bool,
    /// 1 (poor) to 5 (excellent).
    #[serde(default)]
    pub satisfaction: Option<u8>,
    #[serde(default)]
    pub comment: Option<String>,
    pub submitted_at: Timestamp,
}

impl UserFeedback {
    pub fn new(session_id: SessionId, converted: bool) -> Self {
        Self {
            session_id,
            converted,
            satisfaction: None,
            comment: None,
            submitted_at: Timestamp::now(),
        }
    }

    pub fn with_satisfaction(mut self, rating: u8) -> Self {
        self.satisfaction = Some(rating);
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.satisfaction {
            Some(rating) if !(1..=5).contains(&rating) => Err(ValidationError::out_of_range(
                "satisfaction",
                1.0,
                5.0,
                f64::from(rating),
            )),
            _ => Ok(()),
        }
    }
}

/// Event body, one shape per event type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    Detect {
        method: DetectionMethod,
        confidence: f64,
        profile_resolved: bool,
    },
    Adapt {
        emotion: Option<Emotion>,
        applied_rules: Vec<RuleId>,
        adaptation_count: usize,
    },
    ExperimentAssign {
        experiment_id: ExperimentId,
        variant: String,
    },
    Feedback(UserFeedback),
}

impl EventPayload {
    pub fn event_type(&self) -> AnalyticsEventType {
        match self {
            EventPayload::Detect { .. } => AnalyticsEventType::Detect,
            EventPayload::Adapt { .. } => AnalyticsEventType::Adapt,
            EventPayload::ExperimentAssign { .. } => AnalyticsEventType::ExperimentAssign,
            EventPayload::Feedback(_) => AnalyticsEventType::Feedback,
        }
    }
}

/// Immutable record of something the engine did or observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub event_id: EventId,
    pub session_id: SessionId,
    pub country_code: CountryCode,
    pub event_type: AnalyticsEventType,
    pub payload: EventPayload,
    pub timestamp: Timestamp,
}

impl AnalyticsEvent {
    pub fn new(session_id: SessionId, country_code: CountryCode, payload: EventPayload) -> Self {
        Self {
            event_id: EventId::new(),
            session_id,
            country_code,
            event_type: payload.event_type(),
            payload,
            timestamp: Timestamp::now(),
        }
    }

    pub fn at(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = timestamp;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_follows_payload() {
        let event = AnalyticsEvent::new(
            SessionId::new("s").unwrap(),
            CountryCode::new("DE").unwrap(),
            EventPayload::ExperimentAssign {
                experiment_id: ExperimentId::new("e").unwrap(),
                variant: "B".to_string(),
            },
        );
        assert_eq!(event.event_type, AnalyticsEventType::ExperimentAssign);
        assert_eq!(event.event_type.to_string(), "experiment_assign");
    }

    #[test]
    fn satisfaction_must_be_one_to_five() {
        let session = SessionId::new("s").unwrap();
        assert!(UserFeedback::new(session.clone(), true).validate().is_ok());
        assert!(UserFeedback::new(session.clone(), true)
            .with_satisfaction(5)
            .validate()
            .is_ok());
        assert!(UserFeedback::new(session.clone(), true)
            .with_satisfaction(0)
            .validate()
            .is_err());
        assert!(UserFeedback::new(session, false)
            .with_satisfaction(6)
            .validate()
            .is_err());
    }

    #[test]
    fn serializes_as_json_line() {
        let event = AnalyticsEvent::new(
            SessionId::new("s").unwrap(),
            CountryCode::new("JP").unwrap(),
            EventPayload::Detect {
                method: DetectionMethod::Locale,
                confidence: 0.18,
                profile_resolved: true,
            },
        );
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"detect\""));
        assert!(json.contains("\"method\":\"locale\""));
        assert!(!json.contains('\n'));

        let back: AnalyticsEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
