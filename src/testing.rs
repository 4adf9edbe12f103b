//! Test doubles shared by unit tests

use crate::db::Message;
use crate::mail::{
    Label, MailActions, MailError, MailResult, MessageSource, NewLabel, INBOX_LABEL, UNREAD_LABEL,
};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;

/// Port call as observed by the in-memory mailbox
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailCall {
    ListLabels,
    CreateLabel(NewLabel),
    Modify {
        message_id: String,
        add: Vec<String>,
        remove: Vec<String>,
    },
    GetMessage(String),
}

#[derive(Default)]
struct State {
    labels: Vec<Label>,
    messages: Vec<Message>,
    calls: Vec<MailCall>,
    next_label: u32,
    raced: Option<Label>,
    failing: HashSet<String>,
}

/// Mailbox kept in memory; applies label changes the way the provider does
pub struct InMemoryMailbox {
    state: Mutex<State>,
}

impl InMemoryMailbox {
    /// Mailbox with only the INBOX and UNREAD system labels
    pub fn new() -> Self {
        let labels = [INBOX_LABEL, UNREAD_LABEL]
            .iter()
            .map(|id| Label {
                id: id.to_string(),
                name: id.to_string(),
            })
            .collect();

        Self {
            state: Mutex::new(State {
                labels,
                next_label: 1,
                ..Default::default()
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_label(&self, id: &str, name: &str) {
        self.state().labels.push(Label {
            id: id.to_string(),
            name: name.to_string(),
        });
    }

    pub fn add_message(&self, message: &Message) {
        self.state().messages.push(message.clone());
    }

    /// The next creation of `name` loses a race against another client
    pub fn race_label_creation(&self, id: &str, name: &str) {
        self.state().raced = Some(Label {
            id: id.to_string(),
            name: name.to_string(),
        });
    }

    /// Every modify call for `message_id` fails
    pub fn fail_modify_for(&self, message_id: &str) {
        self.state().failing.insert(message_id.to_string());
    }

    pub fn calls(&self) -> Vec<MailCall> {
        self.state().calls.clone()
    }

    pub fn label_id(&self, name: &str) -> Option<String> {
        let wanted = name.to_lowercase();
        self.state()
            .labels
            .iter()
            .find(|label| label.name.to_lowercase() == wanted)
            .map(|label| label.id.clone())
    }

    pub fn label_count(&self) -> usize {
        self.state().labels.len()
    }

    pub fn labels_of(&self, message_id: &str) -> Vec<String> {
        self.state()
            .messages
            .iter()
            .find(|message| message.id == message_id)
            .map(|message| message.label_ids.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl MailActions for InMemoryMailbox {
    async fn list_labels(&self) -> MailResult<Vec<Label>> {
        let mut state = self.state();
        state.calls.push(MailCall::ListLabels);
        Ok(state.labels.clone())
    }

    async fn create_label(&self, label: &NewLabel) -> MailResult<Label> {
        let mut state = self.state();
        state.calls.push(MailCall::CreateLabel(label.clone()));

        let wanted = label.name.to_lowercase();
        if let Some(raced) = state.raced.take() {
            if raced.name.to_lowercase() == wanted {
                state.labels.push(raced);
                return Err(MailError::Conflict("Label name exists or conflicts".to_string()));
            }
            state.raced = Some(raced);
        }
        if state.labels.iter().any(|l| l.name.to_lowercase() == wanted) {
            return Err(MailError::Conflict("Label name exists or conflicts".to_string()));
        }

        let created = Label {
            id: format!("Label_{}", state.next_label),
            name: label.name.clone(),
        };
        state.next_label += 1;
        state.labels.push(created.clone());
        Ok(created)
    }

    async fn modify_message(
        &self,
        message_id: &str,
        add_label_ids: &[String],
        remove_label_ids: &[String],
    ) -> MailResult<()> {
        let mut state = self.state();
        state.calls.push(MailCall::Modify {
            message_id: message_id.to_string(),
            add: add_label_ids.to_vec(),
            remove: remove_label_ids.to_vec(),
        });

        if state.failing.contains(message_id) {
            return Err(MailError::Api {
                status: 500,
                message: "Backend Error".to_string(),
            });
        }

        let message = state
            .messages
            .iter_mut()
            .find(|message| message.id == message_id)
            .ok_or_else(|| MailError::NotFound(format!("message {}", message_id)))?;

        message.label_ids.retain(|id| !remove_label_ids.contains(id));
        for id in add_label_ids {
            if !message.label_ids.contains(id) {
                message.label_ids.push(id.clone());
            }
        }
        Ok(())
    }
}

#[async_trait]
impl MessageSource for InMemoryMailbox {
    async fn list_message_ids(&self, folder: &str, limit: u32) -> MailResult<Vec<String>> {
        Ok(self
            .state()
            .messages
            .iter()
            .filter(|message| message.has_label(folder))
            .take(limit as usize)
            .map(|message| message.id.clone())
            .collect())
    }

    async fn get_message(&self, id: &str) -> MailResult<Message> {
        let mut state = self.state();
        state.calls.push(MailCall::GetMessage(id.to_string()));
        state
            .messages
            .iter()
            .find(|message| message.id == id)
            .cloned()
            .ok_or_else(|| MailError::NotFound(format!("message {}", id)))
    }
}

/// Unread inbox message with neutral headers
pub fn sample_message(id: &str) -> Message {
    Message {
        id: id.to_string(),
        thread_id: format!("thread-{}", id),
        sender: "someone@example.com".to_string(),
        recipients: "me@example.com".to_string(),
        subject: "Hello".to_string(),
        date: "Mon, 01 Jan 2024 10:00:00 +0000".to_string(),
        snippet: "Hello there".to_string(),
        label_ids: vec![INBOX_LABEL.to_string(), UNREAD_LABEL.to_string()],
        body: "Hello there, just checking in.".to_string(),
    }
}
