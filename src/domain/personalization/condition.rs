//! Rule conditions: typed `(field, operator, value)` tuples.

use serde::{Deserialize, Serialize};

use crate::domain::culture::{CommunicationStyle, CulturalProfile, HofstedeDimension};
use crate::domain::detection::DetectionMethod;
use crate::domain::emotion::{Emotion, EmotionDetectionResult};
use crate::domain::foundation::{CountryCode, ValidationError};

/// Context attribute a condition inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionField {
    Country,
    DominantEmotion,
    EmotionIntensity,
    DetectionConfidence,
    CulturalAlignment,
    DetectionMethod,
    CommunicationStyle,
    Dimension(HofstedeDimension),
}

impl ConditionField {
    fn is_numeric(&self) -> bool {
        matches!(
            self,
            ConditionField::EmotionIntensity
                | ConditionField::DetectionConfidence
                | ConditionField::CulturalAlignment
                | ConditionField::Dimension(_)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    AtLeast,
    AtMost,
    In,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Number(f64),
    Text(String),
    List(Vec<String>),
}

/// Everything a condition may look at for one request.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub country_code: &'a CountryCode,
    pub profile: &'a CulturalProfile,
    pub detection_confidence: f64,
    pub detection_method: DetectionMethod,
    /// Absent at detection time, before behavior has been analyzed.
    pub emotion: Option<&'a EmotionDetectionResult>,
}

impl RuleContext<'_> {
    pub fn dominant_emotion(&self) -> Option<Emotion> {
        self.emotion.map(|e| e.dominant)
    }
}

enum Resolved {
    Number(f64),
    Text(String),
}

/// One condition of a personalization rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub field: ConditionField,
    pub operator: ConditionOperator,
    pub value: ConditionValue,
}

impl Condition {
    pub fn new(field: ConditionField, operator: ConditionOperator, value: ConditionValue) -> Self {
        Self {
            field,
            operator,
            value,
        }
    }

    /// Checks that field, operator and value types fit together.
    pub fn validate(&self) -> Result<(), ValidationError> {
        use ConditionOperator::*;

        let ok = match (&self.value, self.operator) {
            (ConditionValue::List(items), In) => !self.field.is_numeric() && !items.is_empty(),
            (ConditionValue::List(_), _) | (_, In) => false,
            (ConditionValue::Number(n), Equals | NotEquals | GreaterThan | LessThan | AtLeast | AtMost) => {
                self.field.is_numeric() && n.is_finite()
            }
            (ConditionValue::Text(_), Equals | NotEquals) => !self.field.is_numeric(),
            (ConditionValue::Text(_), _) => false,
        };

        if !ok {
            return Err(ValidationError::invalid_format(
                "condition",
                format!(
                    "operator {:?} with value {:?} is not applicable to field {:?}",
                    self.operator, self.value, self.field
                ),
            ));
        }

        if let ConditionValue::Text(text) = &self.value {
            self.validate_text(text)?;
        }
        if let ConditionValue::List(items) = &self.value {
            for item in items {
                self.validate_text(item)?;
            }
        }
        Ok(())
    }

    fn validate_text(&self, text: &str) -> Result<(), ValidationError> {
        match self.field {
            ConditionField::Country => CountryCode::new(text).map(|_| ()),
            ConditionField::DominantEmotion => text.parse::<Emotion>().map(|_| ()),
            _ => Ok(()),
        }
    }

    /// Emotions named by this condition, for profile cross-checks.
    pub fn referenced_emotions(&self) -> Vec<Emotion> {
        if self.field != ConditionField::DominantEmotion {
            return Vec::new();
        }
        match &self.value {
            ConditionValue::Text(text) => text.parse().into_iter().collect(),
            ConditionValue::List(items) => items.iter().filter_map(|i| i.parse().ok()).collect(),
            ConditionValue::Number(_) => Vec::new(),
        }
    }

    /// Evaluates against the context. Unknown fields (e.g. emotion before
    /// analysis) evaluate to false.
    pub fn evaluate(&self, ctx: &RuleContext<'_>) -> bool {
        let Some(actual) = Self::resolve(self.field, ctx) else {
            return false;
        };

        match (actual, &self.value) {
            (Resolved::Number(a), ConditionValue::Number(b)) => match self.operator {
                ConditionOperator::Equals => (a - b).abs() < 1e-9,
                ConditionOperator::NotEquals => (a - b).abs() >= 1e-9,
                ConditionOperator::GreaterThan => a > *b,
                ConditionOperator::LessThan => a < *b,
                ConditionOperator::AtLeast => a >= *b,
                ConditionOperator::AtMost => a <= *b,
                ConditionOperator::In => false,
            },
            (Resolved::Text(a), ConditionValue::Text(b)) => match self.operator {
                ConditionOperator::Equals => a.eq_ignore_ascii_case(b),
                ConditionOperator::NotEquals => !a.eq_ignore_ascii_case(b),
                _ => false,
            },
            (Resolved::Text(a), ConditionValue::List(items)) => {
                self.operator == ConditionOperator::In
                    && items.iter().any(|i| a.eq_ignore_ascii_case(i))
            }
            _ => false,
        }
    }

    fn resolve(field: ConditionField, ctx: &RuleContext<'_>) -> Option<Resolved> {
        Some(match field {
            ConditionField::Country => Resolved::Text(ctx.country_code.to_string()),
            ConditionField::DominantEmotion => Resolved::Text(ctx.dominant_emotion()?.to_string()),
            ConditionField::EmotionIntensity => Resolved::Number(ctx.emotion?.intensity),
            ConditionField::DetectionConfidence => Resolved::Number(ctx.detection_confidence),
            ConditionField::CulturalAlignment => Resolved::Number(ctx.emotion?.cultural_alignment),
            ConditionField::DetectionMethod => Resolved::Text(ctx.detection_method.to_string()),
            ConditionField::CommunicationStyle => {
                Resolved::Text(style_name(ctx.profile.communication_style).to_string())
            }
            ConditionField::Dimension(dimension) => {
                Resolved::Number(ctx.profile.dimensions.score(dimension))
            }
        })
    }
}

fn style_name(style: CommunicationStyle) -> &'static str {
    match style {
        CommunicationStyle::Direct => "direct",
        CommunicationStyle::Indirect => "indirect",
        CommunicationStyle::HighContext => "high_context",
        CommunicationStyle::LowContext => "low_context",
    }
}
