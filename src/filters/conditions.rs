//! Filter condition matching logic

use super::time::{parse_message_date, parse_relative_time};
use crate::db::Message;
use chrono::{DateTime, Utc};

/// Single field/operator/value test against a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub field: ConditionField,
    pub operator: ConditionOperator,
    /// Trimmed, lower-cased comparison value
    pub value: String,
}

/// Message fields that can be filtered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionField {
    From,
    To,
    Subject,
    Message,
    Received,
    /// Any other record attribute, looked up by name
    Other(String),
}

/// Comparison operators for conditions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionOperator {
    Contains,
    DoesNotContain,
    Equals,
    DoesNotEqual,
    IsLessThan,
    IsGreaterThan,
    /// Kept so the condition evaluates to a no-match instead of vanishing
    Unsupported(String),
}

/// Whether a field compares as text or as a date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Date,
}

impl ConditionField {
    pub fn parse(field: &str) -> Self {
        match field.trim().to_lowercase().as_str() {
            "from" => Self::From,
            "to" => Self::To,
            "subject" => Self::Subject,
            "message" | "body" => Self::Message,
            "received" | "date received" => Self::Received,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Received => FieldKind::Date,
            _ => FieldKind::Text,
        }
    }

    /// Lower-cased text of this field, empty when absent
    fn text_of(&self, message: &Message) -> String {
        match self {
            Self::From => message.sender.to_lowercase(),
            Self::To => message.recipients.to_lowercase(),
            Self::Subject => message.subject.to_lowercase(),
            Self::Message => message.body.to_lowercase(),
            Self::Received => message.date.to_lowercase(),
            Self::Other(name) => message.attribute(name).unwrap_or_default().to_lowercase(),
        }
    }
}

impl ConditionOperator {
    pub fn parse(operator: &str) -> Self {
        match operator.trim().to_lowercase().as_str() {
            "contains" => Self::Contains,
            "does not contain" => Self::DoesNotContain,
            "equals" => Self::Equals,
            "does not equal" => Self::DoesNotEqual,
            "is less than" | "less than" => Self::IsLessThan,
            "is greater than" | "greater than" => Self::IsGreaterThan,
            other => Self::Unsupported(other.to_string()),
        }
    }

    /// Field kind this operator applies to, `None` when unsupported
    pub fn kind(&self) -> Option<FieldKind> {
        match self {
            Self::Contains | Self::DoesNotContain | Self::Equals | Self::DoesNotEqual => {
                Some(FieldKind::Text)
            }
            Self::IsLessThan | Self::IsGreaterThan => Some(FieldKind::Date),
            Self::Unsupported(_) => None,
        }
    }
}

impl Condition {
    /// Build a condition from loosely-typed text, normalizing every part
    pub fn new(field: &str, operator: &str, value: &str) -> Self {
        Self {
            field: ConditionField::parse(field),
            operator: ConditionOperator::parse(operator),
            value: value.trim().to_lowercase(),
        }
    }

    /// True when the operator can ever match this field
    pub fn is_well_typed(&self) -> bool {
        self.operator.kind() == Some(self.field.kind())
    }

    /// Test if this condition matches the given message right now
    pub fn matches(&self, message: &Message) -> bool {
        self.matches_at(message, Utc::now())
    }

    /// Test if this condition matches, measuring message age from `now`
    pub fn matches_at(&self, message: &Message, now: DateTime<Utc>) -> bool {
        match self.field.kind() {
            FieldKind::Date => self.matches_date(message, now),
            FieldKind::Text => self.matches_text(message),
        }
    }

    fn matches_date(&self, message: &Message, now: DateTime<Utc>) -> bool {
        let Some(received) = parse_message_date(&message.date) else {
            return false;
        };
        let Some(window) = parse_relative_time(&self.value) else {
            return false;
        };

        let age = now - received;
        match self.operator {
            ConditionOperator::IsLessThan => age <= window,
            ConditionOperator::IsGreaterThan => age > window,
            _ => false,
        }
    }

    fn matches_text(&self, message: &Message) -> bool {
        let field_value = self.field.text_of(message);
        let search_value = self.value.as_str();

        match self.operator {
            ConditionOperator::Contains => field_value.contains(search_value),
            ConditionOperator::DoesNotContain => !field_value.contains(search_value),
            ConditionOperator::Equals => field_value == search_value,
            ConditionOperator::DoesNotEqual => field_value != search_value,
            _ => false,
        }
    }
}
