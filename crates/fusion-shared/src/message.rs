//! The message domain model.
//!
//! An attachment is represented as a tagged variant rather than a pair of
//! nullable columns, so "file_url and file_name are present together or not
//! at all" holds by construction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::UserId;

/// Message payload: plain text, or an attachment with an optional caption.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum MessageBody {
    Text(String),
    Attachment {
        /// Display text; defaults to `File: {file_name}` when the sender
        /// typed no caption.
        caption: String,
        /// Public reference to the uploaded binary.
        file_url: String,
        /// Original file name, kept for download links.
        file_name: String,
    },
}

impl MessageBody {
    /// Build an attachment body, deriving the caption from the file name
    /// when the sender typed nothing.
    pub fn attachment(caption: &str, file_url: String, file_name: String) -> Self {
        let caption = if caption.trim().is_empty() {
            format!("File: {file_name}")
        } else {
            caption.trim().to_string()
        };
        Self::Attachment {
            caption,
            file_url,
            file_name,
        }
    }

    /// The display text of the message.
    pub fn content(&self) -> &str {
        match self {
            Self::Text(text) => text,
            Self::Attachment { caption, .. } => caption,
        }
    }
}

/// A single chat message between two participants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Durable identifier once confirmed by the store; a locally generated
    /// placeholder while a send is in flight.
    pub id: Uuid,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub body: MessageBody,
    /// Store-assigned at confirmation; local clock time for in-flight sends.
    pub created_at: DateTime<Utc>,
    /// False at creation; flipped (once) by the receiver's client.
    pub read: bool,
}

impl Message {
    pub fn content(&self) -> &str {
        self.body.content()
    }

    /// `(file_url, file_name)` if this message carries an attachment.
    pub fn attachment(&self) -> Option<(&str, &str)> {
        match &self.body {
            MessageBody::Attachment {
                file_url,
                file_name,
                ..
            } => Some((file_url, file_name)),
            MessageBody::Text(_) => None,
        }
    }

    /// The participant on this message that is not `user`.
    ///
    /// For a self-addressed message the counterpart is `user` itself.
    pub fn counterpart_of(&self, user: UserId) -> UserId {
        if self.sender_id == user {
            self.receiver_id
        } else {
            self.sender_id
        }
    }

    /// Whether this message travels between `a` and `b` (either direction).
    pub fn is_between(&self, a: UserId, b: UserId) -> bool {
        (self.sender_id == a && self.receiver_id == b)
            || (self.sender_id == b && self.receiver_id == a)
    }
}
