//! Mail filtering rules
//!
//! Rules pair conditions with actions. A rule fires for a message when its
//! predicate holds over the conditions' results.

pub mod actions;
pub mod conditions;
pub mod engine;
pub mod labels;
pub mod loader;
pub mod time;

pub use actions::{ActionDispatcher, RuleAction};
pub use conditions::{Condition, ConditionField, ConditionOperator, FieldKind};
pub use engine::{RuleEngine, RunSummary};
pub use labels::resolve_or_create;
pub use loader::{JsonRuleFile, RuleError, RuleSource};
pub use time::parse_relative_time;

use serde::{Deserialize, Serialize};

/// Filter rule loaded from the rule file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub description: Option<String>,
    pub predicate: Predicate,
    pub conditions: Vec<Condition>,
    pub actions: Vec<RuleAction>,
}

impl Rule {
    /// A rule without conditions never fires
    pub fn is_actionable(&self) -> bool {
        !self.conditions.is_empty()
    }

    /// Name used in log lines
    pub fn display_name(&self) -> &str {
        self.description
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or("<unnamed rule>")
    }
}

/// How condition results combine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Predicate {
    #[default]
    All, // AND - all conditions must match
    Any, // OR - any condition must match
}

impl Predicate {
    pub fn as_str(&self) -> &'static str {
        match self {
            Predicate::All => "all",
            Predicate::Any => "any",
        }
    }

    /// Parse a predicate; anything unrecognized is the stricter `All`
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "any" => Predicate::Any,
            _ => Predicate::All,
        }
    }

    /// Combine per-condition results
    pub fn resolve<I>(&self, results: I) -> bool
    where
        I: IntoIterator<Item = bool>,
    {
        let mut results = results.into_iter();
        match self {
            Predicate::All => results.all(|matched| matched),
            Predicate::Any => results.any(|matched| matched),
        }
    }
}
