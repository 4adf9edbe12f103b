//! Gmail REST client
//!
//! Implements both mail ports over the Gmail v1 API:
//! - message listing and full message fetch
//! - label listing and creation
//! - message label modification

use super::{Label, MailActions, MailError, MailResult, MessageSource, NewLabel};
use crate::db::Message;
use async_trait::async_trait;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

pub const GMAIL_API_BASE_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

/// Gmail bodies are base64url, with or without padding
const BODY_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// API client for one authorized Gmail mailbox
#[derive(Debug, Clone)]
pub struct GmailClient {
    client: Client,
    access_token: String,
    base_url: String,
}

impl GmailClient {
    /// Create a client for the authenticated user
    pub fn new(access_token: impl Into<String>) -> MailResult<Self> {
        Self::with_base_url(access_token, GMAIL_API_BASE_URL)
    }

    /// Create a client against another endpoint (test servers, proxies)
    pub fn with_base_url(
        access_token: impl Into<String>,
        base_url: impl Into<String>,
    ) -> MailResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            access_token: access_token.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[async_trait]
impl MessageSource for GmailClient {
    async fn list_message_ids(&self, folder: &str, limit: u32) -> MailResult<Vec<String>> {
        let response = self
            .client
            .get(self.url("messages"))
            .query(&[("labelIds", folder.to_string()), ("maxResults", limit.to_string())])
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        let list: ListMessagesResponse = handle_response(response).await?;
        Ok(list.messages.into_iter().map(|m| m.id).collect())
    }

    async fn get_message(&self, id: &str) -> MailResult<Message> {
        let response = self
            .client
            .get(self.url(&format!("messages/{}", id)))
            .query(&[("format", "full")])
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        let message: GmailMessage = handle_response(response).await?;
        Ok(message.into_message())
    }
}

#[async_trait]
impl MailActions for GmailClient {
    async fn list_labels(&self) -> MailResult<Vec<Label>> {
        let response = self
            .client
            .get(self.url("labels"))
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        let list: ListLabelsResponse = handle_response(response).await?;
        Ok(list.labels)
    }

    async fn create_label(&self, label: &NewLabel) -> MailResult<Label> {
        let response = self
            .client
            .post(self.url("labels"))
            .bearer_auth(&self.access_token)
            .json(label)
            .send()
            .await?;

        handle_response(response).await
    }

    async fn modify_message(
        &self,
        message_id: &str,
        add_label_ids: &[String],
        remove_label_ids: &[String],
    ) -> MailResult<()> {
        let body = ModifyRequest {
            add_label_ids,
            remove_label_ids,
        };

        let response = self
            .client
            .post(self.url(&format!("messages/{}/modify", message_id)))
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;

        let _: serde_json::Value = handle_response(response).await?;
        Ok(())
    }
}

// ============================================================================
// API Request/Response Types
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ModifyRequest<'a> {
    add_label_ids: &'a [String],
    remove_label_ids: &'a [String],
}

#[derive(Debug, Clone, Deserialize)]
struct ListMessagesResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Debug, Clone, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ListLabelsResponse {
    #[serde(default)]
    labels: Vec<Label>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GmailMessage {
    id: String,
    #[serde(default)]
    thread_id: String,
    #[serde(default)]
    label_ids: Vec<String>,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    payload: Option<MessagePart>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessagePart {
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    headers: Vec<Header>,
    #[serde(default)]
    body: Option<PartBody>,
    #[serde(default)]
    parts: Vec<MessagePart>,
}

#[derive(Debug, Clone, Deserialize)]
struct Header {
    name: String,
    value: String,
}

#[derive(Debug, Clone, Deserialize)]
struct PartBody {
    #[serde(default)]
    data: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
}

impl GmailMessage {
    fn into_message(self) -> Message {
        let payload = self.payload.unwrap_or_default();
        let header = |name: &str| payload.header(name).unwrap_or_default().to_string();

        Message {
            sender: header("From"),
            recipients: header("To"),
            subject: header("Subject"),
            date: header("Date"),
            body: payload.plain_text_body().unwrap_or_default(),
            id: self.id,
            thread_id: self.thread_id,
            snippet: self.snippet,
            label_ids: self.label_ids,
        }
    }
}

impl MessagePart {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    fn decoded_body(&self) -> Option<String> {
        let data = self.body.as_ref()?.data.as_deref()?;
        let bytes = BODY_ENGINE.decode(data.trim()).ok()?;
        Some(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Body of a single-part message, or the first text/plain part found
    /// depth-first in a multipart one
    fn plain_text_body(&self) -> Option<String> {
        if self.parts.is_empty() {
            return self.decoded_body();
        }
        self.first_plain_part()
    }

    fn first_plain_part(&self) -> Option<String> {
        self.parts.iter().find_map(|part| {
            if part.mime_type.eq_ignore_ascii_case("text/plain") {
                part.decoded_body()
            } else {
                part.first_plain_part()
            }
        })
    }
}

/// Decode a successful response or map the failure
async fn handle_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> MailResult<T> {
    let status = response.status();

    if status.is_success() {
        response
            .json::<T>()
            .await
            .map_err(|e| MailError::InvalidResponse(e.to_string()))
    } else {
        Err(handle_error(response).await)
    }
}

/// Convert error response to MailError
async fn handle_error(response: reqwest::Response) -> MailError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&text)
        .map(|e| e.error.message)
        .unwrap_or(text);

    match status {
        StatusCode::UNAUTHORIZED => MailError::Unauthorized,
        StatusCode::TOO_MANY_REQUESTS => MailError::RateLimitExceeded,
        StatusCode::CONFLICT => MailError::Conflict(message),
        StatusCode::NOT_FOUND => MailError::NotFound(message),
        _ => MailError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn encode(text: &str) -> String {
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(text)
    }

    #[tokio::test]
    async fn test_list_message_ids() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/messages")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("labelIds".into(), "INBOX".into()),
                Matcher::UrlEncoded("maxResults".into(), "50".into()),
            ]))
            .match_header("authorization", "Bearer token-123")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"messages": [{"id": "a", "threadId": "t"}, {"id": "b", "threadId": "t"}]}"#)
            .create_async()
            .await;

        let client = GmailClient::with_base_url("token-123", server.url()).unwrap();
        let ids = client.list_message_ids("INBOX", 50).await.unwrap();

        assert_eq!(ids, vec!["a", "b"]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_mailbox_has_no_messages_field() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/messages")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"resultSizeEstimate": 0}"#)
            .create_async()
            .await;

        let client = GmailClient::with_base_url("t", server.url()).unwrap();
        assert!(client.list_message_ids("INBOX", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_message_extracts_headers_and_first_plain_part() {
        let mut server = Server::new_async().await;
        let body = json!({
            "id": "m1",
            "threadId": "t1",
            "labelIds": ["INBOX", "UNREAD"],
            "snippet": "Hi there",
            "payload": {
                "mimeType": "multipart/mixed",
                "headers": [
                    {"name": "from", "value": "jobs@tenmiles.com"},
                    {"name": "To", "value": "me@example.com"},
                    {"name": "SUBJECT", "value": "Interview invite"},
                    {"name": "Date", "value": "Tue, 02 Jan 2024 10:30:00 +0000"}
                ],
                "parts": [
                    {
                        "mimeType": "multipart/alternative",
                        "parts": [
                            {"mimeType": "text/html", "body": {"data": encode("<p>html</p>")}},
                            {"mimeType": "text/plain", "body": {"data": encode("first plain")}}
                        ]
                    },
                    {"mimeType": "text/plain", "body": {"data": encode("second plain")}}
                ]
            }
        });
        let _mock = server
            .mock("GET", "/messages/m1")
            .match_query(Matcher::UrlEncoded("format".into(), "full".into()))
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let client = GmailClient::with_base_url("t", server.url()).unwrap();
        let message = client.get_message("m1").await.unwrap();

        assert_eq!(message.id, "m1");
        assert_eq!(message.thread_id, "t1");
        assert_eq!(message.sender, "jobs@tenmiles.com");
        assert_eq!(message.recipients, "me@example.com");
        assert_eq!(message.subject, "Interview invite");
        assert_eq!(message.date, "Tue, 02 Jan 2024 10:30:00 +0000");
        assert_eq!(message.label_ids, vec!["INBOX", "UNREAD"]);
        assert_eq!(message.body, "first plain");
    }

    #[test]
    fn test_single_part_body_and_missing_headers() {
        let message: GmailMessage = serde_json::from_value(json!({
            "id": "m2",
            "payload": {
                "mimeType": "text/plain",
                "headers": [],
                "body": {"data": "aGVsbG8gd29ybGQ="}
            }
        }))
        .unwrap();

        let message = message.into_message();
        assert_eq!(message.body, "hello world");
        assert_eq!(message.sender, "");
        assert!(message.label_ids.is_empty());
    }

    #[test]
    fn test_multipart_without_plain_text_has_empty_body() {
        let message: GmailMessage = serde_json::from_value(json!({
            "id": "m3",
            "payload": {
                "mimeType": "multipart/alternative",
                "parts": [{"mimeType": "text/html", "body": {"data": encode("<b>x</b>")}}]
            }
        }))
        .unwrap();

        assert_eq!(message.into_message().body, "");
    }

    #[tokio::test]
    async fn test_create_label_sends_visibility() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/labels")
            .match_body(Matcher::Json(json!({
                "name": "Jobs",
                "labelListVisibility": "labelShow",
                "messageListVisibility": "show"
            })))
            .with_status(200)
            .with_body(r#"{"id": "Label_5", "name": "Jobs", "type": "user"}"#)
            .create_async()
            .await;

        let client = GmailClient::with_base_url("t", server.url()).unwrap();
        let label = client.create_label(&NewLabel::visible("Jobs")).await.unwrap();

        assert_eq!(label, Label { id: "Label_5".to_string(), name: "Jobs".to_string() });
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_label_conflict() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/labels")
            .with_status(409)
            .with_body(r#"{"error": {"code": 409, "message": "Label name exists or conflicts"}}"#)
            .create_async()
            .await;

        let client = GmailClient::with_base_url("t", server.url()).unwrap();
        let err = client.create_label(&NewLabel::visible("Jobs")).await.unwrap_err();

        assert!(matches!(err, MailError::Conflict(msg) if msg == "Label name exists or conflicts"));
    }

    #[tokio::test]
    async fn test_modify_message_body() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/messages/m1/modify")
            .match_body(Matcher::Json(json!({
                "addLabelIds": ["Label_5"],
                "removeLabelIds": ["INBOX"]
            })))
            .with_status(200)
            .with_body(r#"{"id": "m1", "labelIds": ["Label_5"]}"#)
            .create_async()
            .await;

        let client = GmailClient::with_base_url("t", server.url()).unwrap();
        client
            .modify_message("m1", &["Label_5".to_string()], &["INBOX".to_string()])
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_statuses_are_mapped() {
        let mut server = Server::new_async().await;
        let _unauthorized = server
            .mock("GET", "/labels")
            .with_status(401)
            .create_async()
            .await;

        let client = GmailClient::with_base_url("expired", server.url()).unwrap();
        assert!(matches!(client.list_labels().await, Err(MailError::Unauthorized)));

        let _rate_limited = server
            .mock("POST", "/messages/m1/modify")
            .with_status(429)
            .create_async()
            .await;
        assert!(matches!(
            client.modify_message("m1", &[], &[]).await,
            Err(MailError::RateLimitExceeded)
        ));
    }
}
