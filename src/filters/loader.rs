//! Rule definitions stored as a JSON document

use super::{Condition, Predicate, Rule, RuleAction};
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("Failed to read rule file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid rule file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Where rules come from
pub trait RuleSource {
    /// Load every usable rule; no definitions yet is an empty list
    fn load_rules(&self) -> Result<Vec<Rule>, RuleError>;
}

/// Rule document as written by the rule builder
#[derive(Debug, Clone, Deserialize)]
pub struct RuleDocument {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub predicate: Option<String>,
    #[serde(default)]
    pub conditions: Vec<ConditionDocument>,
    /// Checked one by one so a bad entry only loses itself
    #[serde(default)]
    pub actions: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConditionDocument {
    pub field: String,
    pub operator: String,
    /// Usually text; numbers are accepted for durations
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActionDocument {
    pub action: String,
    #[serde(default)]
    pub mailbox: Option<String>,
}

impl ConditionDocument {
    fn value_text(&self) -> String {
        match &self.value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

impl RuleDocument {
    /// Convert into a typed rule, dropping malformed or unknown actions with
    /// a warning.
    ///
    /// Conditions are never dropped: one that cannot match stays in place so
    /// an `all` rule does not become looser.
    pub fn into_rule(self) -> Rule {
        let predicate = match self.predicate.as_deref() {
            None => Predicate::All,
            Some(raw) => {
                let predicate = Predicate::parse(raw);
                if predicate.as_str() != raw.trim().to_lowercase() {
                    log::warn!("Unknown predicate '{}', treating as 'all'", raw);
                }
                predicate
            }
        };

        let conditions: Vec<Condition> = self
            .conditions
            .iter()
            .map(|doc| {
                let condition = Condition::new(&doc.field, &doc.operator, &doc.value_text());
                if !condition.is_well_typed() {
                    log::warn!(
                        "Condition '{} {}' can never match",
                        doc.field.trim(),
                        doc.operator.trim()
                    );
                }
                condition
            })
            .collect();

        let actions = self
            .actions
            .into_iter()
            .filter_map(|entry| {
                let doc = match serde_json::from_value::<ActionDocument>(entry.clone()) {
                    Ok(doc) => doc,
                    Err(e) => {
                        log::warn!("Skipping malformed action {}: {}", entry, e);
                        return None;
                    }
                };
                let action = RuleAction::parse(&doc.action, doc.mailbox.as_deref());
                if action.is_none() {
                    log::warn!("Skipping unknown action '{}'", doc.action);
                }
                action
            })
            .collect();

        Rule {
            description: self.description,
            predicate,
            conditions,
            actions,
        }
    }
}

/// Parse a JSON array of rule documents.
///
/// Entries that do not have the shape of a rule are dropped with a warning.
pub fn parse_rules(json: &str) -> Result<Vec<Rule>, RuleError> {
    let entries: Vec<serde_json::Value> = serde_json::from_str(json)?;

    let rules = entries
        .into_iter()
        .enumerate()
        .filter_map(|(idx, entry)| match serde_json::from_value::<RuleDocument>(entry) {
            Ok(doc) => Some(doc.into_rule()),
            Err(e) => {
                log::warn!("Dropping malformed rule #{}: {}", idx, e);
                None
            }
        })
        .collect();

    Ok(rules)
}

/// Rules kept in a JSON file on disk
#[derive(Debug, Clone)]
pub struct JsonRuleFile {
    path: PathBuf,
}

impl JsonRuleFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RuleSource for JsonRuleFile {
    fn load_rules(&self) -> Result<Vec<Rule>, RuleError> {
        let json = match std::fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No rule file at {:?}, nothing to apply", self.path);
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(RuleError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let rules = parse_rules(&json)?;
        log::info!("Loaded {} rule(s) from {:?}", rules.len(), self.path);
        Ok(rules)
    }
}
