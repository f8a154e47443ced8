//! UX adaptation directives.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::UnitInterval;

/// Kind of UI element a directive targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementType {
    Color,
    Text,
    Layout,
    Imagery,
    Cta,
    Form,
    SocialProof,
}

/// What to do to the targeted element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdaptationAction {
    Replace {
        #[serde(default)]
        original: Option<String>,
        value: String,
    },
    Modify {
        #[serde(default)]
        original: Option<String>,
        value: String,
    },
    Add {
        value: String,
    },
    Remove,
    Style {
        property: String,
        value: String,
    },
}

impl AdaptationAction {
    /// The value the element ends up with, if the action sets one.
    pub fn adapted_value(&self) -> Option<&str> {
        match self {
            AdaptationAction::Replace { value, .. }
            | AdaptationAction::Modify { value, .. }
            | AdaptationAction::Add { value }
            | AdaptationAction::Style { value, .. } => Some(value),
            AdaptationAction::Remove => None,
        }
    }

    pub fn original_value(&self) -> Option<&str> {
        match self {
            AdaptationAction::Replace { original, .. } | AdaptationAction::Modify { original, .. } => {
                original.as_deref()
            }
            AdaptationAction::Add { .. }
            | AdaptationAction::Remove
            | AdaptationAction::Style { .. } => None,
        }
    }

    /// Same action with the adapted value swapped out.
    pub fn with_value(&self, new_value: impl Into<String>) -> Self {
        let new_value = new_value.into();
        match self {
            AdaptationAction::Replace { original, .. } => AdaptationAction::Replace {
                original: original.clone(),
                value: new_value,
            },
            AdaptationAction::Modify { original, .. } => AdaptationAction::Modify {
                original: original.clone(),
                value: new_value,
            },
            AdaptationAction::Add { .. } => AdaptationAction::Add { value: new_value },
            AdaptationAction::Style { property, .. } => AdaptationAction::Style {
                property: property.clone(),
                value: new_value,
            },
            AdaptationAction::Remove => AdaptationAction::Remove,
        }
    }
}

/// A concrete, targeted UI change. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UXAdaptation {
    pub element_type: ElementType,
    pub target_selector: String,
    pub action: AdaptationAction,
    /// Audit-only explanation.
    #[serde(default)]
    pub cultural_rationale: String,
    pub expected_impact: UnitInterval,
}

impl UXAdaptation {
    pub fn new(
        element_type: ElementType,
        target_selector: impl Into<String>,
        action: AdaptationAction,
        expected_impact: f64,
    ) -> Self {
        Self {
            element_type,
            target_selector: target_selector.into(),
            action,
            cultural_rationale: String::new(),
            expected_impact: UnitInterval::new(expected_impact),
        }
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.cultural_rationale = rationale.into();
        self
    }

    /// Copy of this directive with a different adapted value.
    pub fn with_adapted_value(&self, value: impl Into<String>) -> Self {
        Self {
            action: self.action.with_value(value),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_deserializes_from_tagged_yaml() {
        let yaml = "kind: style\nproperty: background-color\nvalue: '#c00'\n";
        let action: AdaptationAction = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(action.adapted_value(), Some("#c00"));
    }

    #[test]
    fn remove_has_no_adapted_value() {
        assert_eq!(AdaptationAction::Remove.adapted_value(), None);
        assert_eq!(AdaptationAction::Remove.with_value("x"), AdaptationAction::Remove);
    }

    #[test]
    fn with_adapted_value_keeps_original() {
        let adaptation = UXAdaptation::new(
            ElementType::Text,
            "#headline",
            AdaptationAction::Replace {
                original: Some("Buy now".to_string()),
                value: "Buy four".to_string(),
            },
            0.4,
        );
        let swapped = adaptation.with_adapted_value("Buy five");
        assert_eq!(swapped.action.adapted_value(), Some("Buy five"));
        assert_eq!(swapped.action.original_value(), Some("Buy now"));
        assert_eq!(swapped.target_selector, "#headline");
    }
}
