//! HTTP-backed store client.
//!
//! Talks to a hosted relational store exposing a PostgREST-style row API
//! plus an object-storage API. This is the sole persistence gateway for
//! messages: reads, inserts, read-flag updates and attachment uploads all
//! go through here.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use tracing::{debug, info, warn};

use fusion_shared::constants::{MAX_ATTACHMENT_SIZE, MESSAGES_TABLE, USERS_TABLE};
use fusion_shared::types::UserId;
use fusion_shared::{Message, MessageBody, Session};

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::models::{Attachment, MessageRow, NewMessageRow, Profile};
use crate::traits::{MessageStore, ObjectStore, UserDirectory};

use async_trait::async_trait;

/// Client for the hosted row store and object storage.
#[derive(Debug, Clone)]
pub struct RemoteStore {
    http: reqwest::Client,
    config: StoreConfig,
    /// Per-user bearer token; falls back to the API key when absent.
    access_token: Option<String>,
}

impl RemoteStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            access_token: None,
        }
    }

    /// Bind the client to a login session so requests carry the user's
    /// own bearer token.
    pub fn with_session(config: StoreConfig, session: &Session) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            access_token: session.access_token.clone(),
        }
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.config.base_url, table)
    }

    fn upload_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.config.base_url, self.config.bucket, path
        )
    }

    /// Stable public reference for an uploaded object.
    fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.config.base_url, self.config.bucket, path
        )
    }

    fn auth_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&self.config.api_key) {
            headers.insert("apikey", value);
        }
        let bearer = self
            .access_token
            .as_deref()
            .unwrap_or(&self.config.api_key);
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {bearer}")) {
            headers.insert(AUTHORIZATION, value);
        }
        headers
    }

    /// Decode a row-set response into domain messages, dropping nothing:
    /// a single malformed row fails the whole read.
    fn decode_rows(rows: Vec<MessageRow>) -> Result<Vec<Message>> {
        rows.into_iter().map(Message::try_from).collect()
    }

    /// Insert a message row and decode the returned representation.
    async fn insert_row(&self, row: NewMessageRow) -> std::result::Result<Message, anyhow::Error> {
        let response = self
            .http
            .post(self.rest_url(MESSAGES_TABLE))
            .headers(self.auth_headers())
            .header("Prefer", "return=representation")
            .json(&[row])
            .send()
            .await?
            .error_for_status()?;

        let mut rows: Vec<MessageRow> = response.json().await?;
        if rows.is_empty() {
            anyhow::bail!("insert returned no representation");
        }
        Ok(Message::try_from(rows.remove(0))?)
    }
}

#[async_trait]
impl MessageStore for RemoteStore {
    async fn fetch_conversation(&self, a: UserId, b: UserId) -> Result<Vec<Message>> {
        let filter = conversation_filter(a, b);
        let response = self
            .http
            .get(self.rest_url(MESSAGES_TABLE))
            .headers(self.auth_headers())
            .query(&[
                ("select", "*"),
                ("or", filter.as_str()),
                ("order", "created_at.asc"),
            ])
            .send()
            .await
            .map_err(StoreError::unavailable)?
            .error_for_status()
            .map_err(StoreError::unavailable)?;

        let rows: Vec<MessageRow> = response.json().await.map_err(StoreError::unavailable)?;
        debug!(count = rows.len(), a = %a, b = %b, "Fetched conversation");
        Self::decode_rows(rows)
    }

    async fn fetch_all_for(&self, user: UserId) -> Result<Vec<Message>> {
        let response = self
            .http
            .get(self.rest_url(MESSAGES_TABLE))
            .headers(self.auth_headers())
            .query(&[("select", "*"), ("or", participant_filter(user).as_str())])
            .send()
            .await
            .map_err(StoreError::unavailable)?
            .error_for_status()
            .map_err(StoreError::unavailable)?;

        let rows: Vec<MessageRow> = response.json().await.map_err(StoreError::unavailable)?;
        debug!(count = rows.len(), user = %user, "Fetched inbox rows");
        Self::decode_rows(rows)
    }

    async fn send(
        &self,
        sender: UserId,
        receiver: UserId,
        content: &str,
        attachment: Option<Attachment>,
    ) -> Result<Message> {
        match attachment {
            None => {
                let row = NewMessageRow {
                    sender_id: sender,
                    receiver_id: receiver,
                    content: content.trim().to_string(),
                    file_url: None,
                    file_name: None,
                };
                let message = self.insert_row(row).await.map_err(StoreError::SendFailed)?;
                info!(id = %message.id, receiver = %receiver, "Message sent");
                Ok(message)
            }
            Some(attachment) => {
                if attachment.size() > MAX_ATTACHMENT_SIZE {
                    return Err(StoreError::AttachmentTooLarge {
                        size: attachment.size(),
                        max: MAX_ATTACHMENT_SIZE,
                    });
                }

                let path = object_path(&attachment.file_name);
                let file_url = self.upload(&path, &attachment).await?;

                let body = MessageBody::attachment(
                    content,
                    file_url.clone(),
                    attachment.file_name.clone(),
                );
                let row = NewMessageRow {
                    sender_id: sender,
                    receiver_id: receiver,
                    content: body.content().to_string(),
                    file_url: Some(file_url.clone()),
                    file_name: Some(attachment.file_name.clone()),
                };

                // The blob is already durable; an insert failure here must
                // be distinguishable from a clean failure.
                match self.insert_row(row).await {
                    Ok(message) => {
                        info!(id = %message.id, file = %attachment.file_name, "Attachment message sent");
                        Ok(message)
                    }
                    Err(source) => {
                        warn!(
                            file_url = %file_url,
                            "Row insert failed after upload; attachment orphaned"
                        );
                        Err(StoreError::PartialSend {
                            file_url,
                            file_name: attachment.file_name,
                            source,
                        })
                    }
                }
            }
        }
    }

    async fn mark_read(&self, receiver: UserId, sender: UserId) -> Result<u64> {
        let response = self
            .http
            .patch(self.rest_url(MESSAGES_TABLE))
            .headers(self.auth_headers())
            .header("Prefer", "return=representation")
            .query(&[
                ("receiver_id", format!("eq.{receiver}")),
                ("sender_id", format!("eq.{sender}")),
                ("read", "is.false".to_string()),
            ])
            .json(&serde_json::json!({ "read": true }))
            .send()
            .await
            .map_err(StoreError::unavailable)?
            .error_for_status()
            .map_err(StoreError::unavailable)?;

        let rows: Vec<MessageRow> = response.json().await.map_err(StoreError::unavailable)?;
        debug!(count = rows.len(), receiver = %receiver, sender = %sender, "Marked read");
        Ok(rows.len() as u64)
    }
}

#[async_trait]
impl ObjectStore for RemoteStore {
    async fn upload(&self, path: &str, attachment: &Attachment) -> Result<String> {
        let response = self
            .http
            .post(self.upload_url(path))
            .headers(self.auth_headers())
            .header(
                CONTENT_TYPE,
                HeaderValue::from_str(&attachment.content_type)
                    .unwrap_or(HeaderValue::from_static("application/octet-stream")),
            )
            .body(attachment.data.clone())
            .send()
            .await
            .map_err(StoreError::upload_failed)?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(StoreError::UploadFailed(anyhow::anyhow!(
                "upload rejected with {status}: {detail}"
            )));
        }

        debug!(path = %path, size = attachment.size(), "Attachment uploaded");
        Ok(self.public_url(path))
    }
}

#[async_trait]
impl UserDirectory for RemoteStore {
    async fn fetch_profile(&self, user: UserId) -> Result<Profile> {
        let response = self
            .http
            .get(self.rest_url(USERS_TABLE))
            .headers(self.auth_headers())
            .query(&[
                ("select", "id,first_name,last_name,profile_picture"),
                ("id", format!("eq.{user}").as_str()),
            ])
            .send()
            .await
            .map_err(StoreError::unavailable)?
            .error_for_status()
            .map_err(StoreError::unavailable)?;

        let mut profiles: Vec<Profile> = response.json().await.map_err(StoreError::unavailable)?;
        if profiles.is_empty() {
            return Err(StoreError::NotFound);
        }
        Ok(profiles.remove(0))
    }
}

/// `or=` filter selecting both directions of a conversation.
fn conversation_filter(a: UserId, b: UserId) -> String {
    format!(
        "(and(sender_id.eq.{a},receiver_id.eq.{b}),and(sender_id.eq.{b},receiver_id.eq.{a}))"
    )
}

/// `or=` filter selecting every message a user participates in.
fn participant_filter(user: UserId) -> String {
    format!("(sender_id.eq.{user},receiver_id.eq.{user})")
}

/// Collision-resistant storage path: millisecond timestamp plus the file
/// name with whitespace collapsed to underscores.
fn object_path(file_name: &str) -> String {
    let sanitized: String = file_name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_");
    let sanitized = if sanitized.is_empty() {
        "file".to_string()
    } else {
        sanitized
    };
    format!("public/{}-{}", chrono::Utc::now().timestamp_millis(), sanitized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn conversation_filter_covers_both_directions() {
        let a = UserId(Uuid::nil());
        let b = UserId(Uuid::from_u128(1));
        let filter = conversation_filter(a, b);
        assert!(filter.contains(&format!("sender_id.eq.{a},receiver_id.eq.{b}")));
        assert!(filter.contains(&format!("sender_id.eq.{b},receiver_id.eq.{a}")));
    }

    #[test]
    fn object_path_sanitizes_whitespace() {
        let path = object_path("term paper draft.pdf");
        assert!(path.starts_with("public/"));
        assert!(path.ends_with("-term_paper_draft.pdf"));
        assert!(!path.contains(' '));
    }

    #[test]
    fn object_path_handles_empty_name() {
        assert!(object_path("   ").ends_with("-file"));
    }

    #[test]
    fn public_url_shape() {
        let store = RemoteStore::new(StoreConfig::default());
        let url = store.public_url("public/1-a.png");
        assert_eq!(
            url,
            "http://localhost:54321/storage/v1/object/public/message-attachments/public/1-a.png"
        );
    }
}
