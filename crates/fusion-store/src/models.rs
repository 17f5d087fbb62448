//! Wire-level row shapes for the remote tables.
//!
//! The remote `messages` table stores an attachment as two nullable columns.
//! [`MessageRow`] mirrors that shape for serde; conversion into the domain
//! [`Message`] rejects rows where only one of the two is populated, so the
//! both-or-neither invariant is checked exactly once, at the boundary.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use fusion_shared::types::UserId;
use fusion_shared::{Message, MessageBody};

use crate::error::StoreError;

/// Flat serde mirror of a `messages` table row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageRow {
    pub id: Uuid,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub content: String,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

impl TryFrom<MessageRow> for Message {
    type Error = StoreError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        let body = match (row.file_url, row.file_name) {
            (None, None) => MessageBody::Text(row.content),
            (Some(file_url), Some(file_name)) => MessageBody::Attachment {
                caption: row.content,
                file_url,
                file_name,
            },
            _ => {
                return Err(StoreError::InvalidRow(format!(
                    "message {} has a partial attachment reference",
                    row.id
                )));
            }
        };
        Ok(Message {
            id: row.id,
            sender_id: row.sender_id,
            receiver_id: row.receiver_id,
            body,
            created_at: row.created_at,
            read: row.read,
        })
    }
}

impl From<&Message> for MessageRow {
    fn from(msg: &Message) -> Self {
        let (content, file_url, file_name) = match &msg.body {
            MessageBody::Text(text) => (text.clone(), None, None),
            MessageBody::Attachment {
                caption,
                file_url,
                file_name,
            } => (
                caption.clone(),
                Some(file_url.clone()),
                Some(file_name.clone()),
            ),
        };
        Self {
            id: msg.id,
            sender_id: msg.sender_id,
            receiver_id: msg.receiver_id,
            content,
            file_url,
            file_name,
            created_at: msg.created_at,
            read: msg.read,
        }
    }
}

/// Insert payload; id and created_at are assigned by the store.
#[derive(Debug, Clone, Serialize)]
pub struct NewMessageRow {
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

/// User-directory row: display info for conversation headers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    pub id: UserId,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub profile_picture: Option<String>,
}

impl Profile {
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (Some(first), None) => first.clone(),
            (None, Some(last)) => last.clone(),
            (None, None) => self.id.to_string(),
        }
    }
}

/// A user-selected file ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl Attachment {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}
