//! Filter actions to perform on matched messages

use super::labels::resolve_or_create;
use crate::db::Message;
use crate::mail::{MailActions, MailResult, INBOX_LABEL, UNREAD_LABEL};
use serde::{Deserialize, Serialize};

/// Mailbox used by a move action that names none
pub const DEFAULT_MAILBOX: &str = "Inbox";

/// Action to perform when a rule matches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RuleAction {
    /// Remove the unread marker
    MarkAsRead,
    /// Add the unread marker
    MarkAsUnread,
    /// Label the message with `mailbox` and take it out of the inbox
    MoveMessage { mailbox: String },
}

impl RuleAction {
    /// Parse an action name such as "Mark as Read" or "move_message".
    ///
    /// Returns `None` for unknown kinds.
    pub fn parse(action: &str, mailbox: Option<&str>) -> Option<Self> {
        let normalized = action.trim().to_lowercase().replace(['_', '-'], " ");

        match normalized.as_str() {
            "mark as read" => Some(Self::MarkAsRead),
            "mark as unread" => Some(Self::MarkAsUnread),
            "move message" => Some(Self::move_to(mailbox.unwrap_or(DEFAULT_MAILBOX))),
            _ => None,
        }
    }

    /// Create a move action, falling back to the inbox for a blank name
    pub fn move_to(mailbox: &str) -> Self {
        let mailbox = mailbox.trim();
        Self::MoveMessage {
            mailbox: if mailbox.is_empty() {
                DEFAULT_MAILBOX.to_string()
            } else {
                mailbox.to_string()
            },
        }
    }
}

/// Turns rule actions into mailbox mutation calls
pub struct ActionDispatcher<'a, M: MailActions + ?Sized> {
    mail: &'a M,
}

impl<'a, M: MailActions + ?Sized> ActionDispatcher<'a, M> {
    pub fn new(mail: &'a M) -> Self {
        Self { mail }
    }

    /// Apply one action to one message with a single modify call
    pub async fn apply(&self, action: &RuleAction, message: &Message) -> MailResult<()> {
        match action {
            RuleAction::MarkAsRead => {
                self.mail
                    .modify_message(&message.id, &[], &[UNREAD_LABEL.to_string()])
                    .await
            }
            RuleAction::MarkAsUnread => {
                self.mail
                    .modify_message(&message.id, &[UNREAD_LABEL.to_string()], &[])
                    .await
            }
            RuleAction::MoveMessage { mailbox } => {
                let label_id = resolve_or_create(self.mail, mailbox).await?;

                // Moving into the inbox must not strip the label it adds
                let remove = if label_id == INBOX_LABEL {
                    Vec::new()
                } else {
                    vec![INBOX_LABEL.to_string()]
                };

                log::debug!("Moving message {} to '{}' ({})", message.id, mailbox, label_id);
                self.mail
                    .modify_message(&message.id, &[label_id], &remove)
                    .await
            }
        }
    }
}
