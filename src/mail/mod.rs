//! # Inbox Rules - Mail Module
//!
//! Ports the rule engine talks through, plus the Gmail implementation.

pub mod gmail;

use crate::db::Message;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use gmail::GmailClient;

/// System label carried by every message shown in the inbox
pub const INBOX_LABEL: &str = "INBOX";

/// System label marking a message as unread
pub const UNREAD_LABEL: &str = "UNREAD";

/// Result type alias for mail operations
pub type MailResult<T> = Result<T, MailError>;

/// Unified error type for mail operations
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Unauthorized - access token rejected")]
    Unauthorized,

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Provider-side label (name <-> opaque id)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub id: String,
    pub name: String,
}

/// Whether a label is listed in the label sidebar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LabelListVisibility {
    LabelShow,
}

/// Whether a label is shown next to messages in the message list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageListVisibility {
    Show,
}

/// Label creation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLabel {
    pub name: String,
    pub label_list_visibility: LabelListVisibility,
    pub message_list_visibility: MessageListVisibility,
}

impl NewLabel {
    /// A label shown both in the label list and in the message list
    pub fn visible(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label_list_visibility: LabelListVisibility::LabelShow,
            message_list_visibility: MessageListVisibility::Show,
        }
    }
}

/// Read side: where snapshot messages come from
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// List message ids in `folder` (a label id), newest first, at most `limit`
    async fn list_message_ids(&self, folder: &str, limit: u32) -> MailResult<Vec<String>>;

    /// Fetch one full message record
    async fn get_message(&self, id: &str) -> MailResult<Message>;
}

/// Write side: mailbox mutations issued by the rule engine
#[async_trait]
pub trait MailActions: Send + Sync {
    async fn list_labels(&self) -> MailResult<Vec<Label>>;

    async fn create_label(&self, label: &NewLabel) -> MailResult<Label>;

    /// Add and remove labels on one message in a single call
    async fn modify_message(
        &self,
        message_id: &str,
        add_label_ids: &[String],
        remove_label_ids: &[String],
    ) -> MailResult<()>;
}
