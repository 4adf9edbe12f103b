//! Rule engine - applies rules to a message snapshot

use super::{ActionDispatcher, Rule};
use crate::db::Message;
use crate::mail::{MailActions, MailResult};
use chrono::{DateTime, Utc};

/// Counts for one engine run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub messages_scanned: usize,
    pub rules_matched: usize,
    pub actions_dispatched: usize,
}

/// Rule engine that evaluates rules and issues their actions
pub struct RuleEngine<'a, M: MailActions + ?Sized> {
    mail: &'a M,
}

impl<'a, M: MailActions + ?Sized> RuleEngine<'a, M> {
    /// Create a new rule engine issuing mutations through `mail`
    pub fn new(mail: &'a M) -> Self {
        Self { mail }
    }

    /// Apply every rule to every message, in order
    pub async fn run(&self, messages: &[Message], rules: &[Rule]) -> MailResult<RunSummary> {
        self.run_at(messages, rules, Utc::now()).await
    }

    /// Same as [`run`](Self::run) with message ages measured from `now`.
    ///
    /// Stops at the first mailbox error; actions already issued stay applied.
    pub async fn run_at(
        &self,
        messages: &[Message],
        rules: &[Rule],
        now: DateTime<Utc>,
    ) -> MailResult<RunSummary> {
        let dispatcher = ActionDispatcher::new(self.mail);
        let mut summary = RunSummary::default();

        for message in messages {
            summary.messages_scanned += 1;

            for rule in rules {
                if !self.test_rule(rule, message, now) {
                    continue;
                }

                summary.rules_matched += 1;
                log::info!(
                    "Rule '{}' matched message '{}' (ID: {})",
                    rule.display_name(),
                    message.subject,
                    message.id
                );

                for action in &rule.actions {
                    dispatcher.apply(action, message).await?;
                    summary.actions_dispatched += 1;
                }
            }
        }

        log::info!(
            "Rule run finished: {} message(s), {} match(es), {} action(s)",
            summary.messages_scanned,
            summary.rules_matched,
            summary.actions_dispatched
        );

        Ok(summary)
    }

    /// Test if a single rule matches a message
    pub fn test_rule(&self, rule: &Rule, message: &Message, now: DateTime<Utc>) -> bool {
        if !rule.is_actionable() {
            return false;
        }

        let results: Vec<bool> = rule
            .conditions
            .iter()
            .map(|condition| condition.matches_at(message, now))
            .collect();

        rule.predicate.resolve(results)
    }
}
