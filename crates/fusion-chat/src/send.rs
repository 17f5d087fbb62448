//! Optimistic send controller.
//!
//! Every submit gets a fresh temp id and an immediately visible placeholder
//! entry; the store round trip then either replaces it in place with the
//! confirmed row or rolls it back. Concurrent sends are independent — each
//! attempt is keyed by its own temp id and never touches another's entry.

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use fusion_shared::constants::MAX_MESSAGE_LEN;
use fusion_shared::{Message, MessageBody};

use crate::conversation::ConversationView;
use crate::error::{ChatError, Result};
use crate::events::{emit, ChatEvent};

/// Where a send attempt ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendState {
    /// Placeholder visible, store round trip still in flight. Only observed
    /// through [`VisibleMessage::optimistic`](crate::VisibleMessage).
    Pending,
    Confirmed,
    Failed,
}

/// Result of one send attempt.
#[derive(Debug)]
pub struct SendOutcome {
    pub state: SendState,
    pub temp_id: Uuid,
    /// The confirmed message, on success.
    pub message: Option<Message>,
    /// What went wrong, on failure. The optimistic entry is already rolled
    /// back by the time the caller sees this.
    pub error: Option<ChatError>,
}

impl ConversationView {
    /// Send `text` together with whatever is currently staged.
    ///
    /// Returns `Err` only when nothing was attempted (closed view, empty
    /// message); an attempt that reached the store reports its fate in the
    /// returned [`SendOutcome`] and on the event channel.
    pub async fn send(&self, text: &str) -> Result<SendOutcome> {
        if self.state.is_closed() {
            return Err(ChatError::ViewClosed);
        }

        let content = text.trim();
        if content.chars().count() > MAX_MESSAGE_LEN {
            return Err(ChatError::MessageTooLong {
                len: content.chars().count(),
                max: MAX_MESSAGE_LEN,
            });
        }

        let staged = self.staging.lock().await.take();
        if content.is_empty() && staged.is_none() {
            return Err(ChatError::EmptyMessage);
        }

        let temp_id = Uuid::new_v4();
        // Placeholder body; the attachment variant gets its real URL from
        // the confirmed row, the temp entry only needs the display caption.
        let body = match &staged {
            Some(staged) => MessageBody::attachment(
                content,
                String::new(),
                staged.attachment.file_name.clone(),
            ),
            None => MessageBody::Text(content.to_string()),
        };
        let placeholder = Message {
            id: temp_id,
            sender_id: self.session.user_id,
            receiver_id: self.counterpart,
            body,
            // Local clock; replaced by the store timestamp on confirmation.
            created_at: Utc::now(),
            read: false,
        };
        self.state.append_optimistic(placeholder);
        debug!(temp_id = %temp_id, attachment = staged.is_some(), "Send attempt");

        let attachment = staged.as_ref().map(|s| s.attachment.clone());
        let result = self
            .store
            .send(self.session.user_id, self.counterpart, content, attachment)
            .await;

        match result {
            Ok(confirmed) => {
                self.state.confirm(temp_id, confirmed.clone());
                emit(
                    &self.events,
                    ChatEvent::Confirmed {
                        temp_id,
                        message: confirmed.clone(),
                    },
                );
                Ok(SendOutcome {
                    state: SendState::Confirmed,
                    temp_id,
                    message: Some(confirmed),
                    error: None,
                })
            }
            Err(e) => {
                self.state.rollback(temp_id);
                let error = ChatError::from(e);
                warn!(temp_id = %temp_id, error = %error, "Send failed");
                match &error {
                    ChatError::UploadFailed(_) => {
                        // The file never left the process; put it back so
                        // the user can retry without re-selecting.
                        if let Some(staged) = staged {
                            self.staging.lock().await.restore(staged);
                        }
                        emit(
                            &self.events,
                            ChatEvent::SendFailed {
                                temp_id,
                                reason: error.to_string(),
                            },
                        );
                    }
                    ChatError::PartialSendFailure {
                        file_url,
                        file_name,
                        ..
                    } => {
                        emit(
                            &self.events,
                            ChatEvent::PartialSendFailure {
                                temp_id,
                                file_url: file_url.clone(),
                                file_name: file_name.clone(),
                            },
                        );
                    }
                    _ => {
                        emit(
                            &self.events,
                            ChatEvent::SendFailed {
                                temp_id,
                                reason: error.to_string(),
                            },
                        );
                    }
                }
                Ok(SendOutcome {
                    state: SendState::Failed,
                    temp_id,
                    message: None,
                    error: Some(error),
                })
            }
        }
    }
}
