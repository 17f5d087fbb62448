use thiserror::Error;

use fusion_store::StoreError;

/// Errors surfaced by the messaging engine.
///
/// Every store failure is converted at the component boundary into one of
/// these; none of them leaves a ghost optimistic entry in the visible list.
#[derive(Error, Debug)]
pub enum ChatError {
    /// Read path failed. The conversation keeps its last known state and
    /// the caller should offer a retry, not render an empty conversation.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),

    /// Insert rejected; the optimistic entry has been rolled back.
    #[error("Send failed: {0}")]
    SendFailed(#[source] StoreError),

    /// Attachment upload failed; the staged file is preserved for retry.
    #[error("Attachment upload failed: {0}")]
    UploadFailed(#[source] StoreError),

    /// The attachment uploaded but the message row did not land. Surfaced
    /// distinctly: an orphaned blob exists at `file_url`.
    #[error("Send failed after upload; orphaned attachment at {file_url}")]
    PartialSendFailure {
        file_url: String,
        file_name: String,
        #[source]
        source: anyhow::Error,
    },

    /// Live subscription failure (resubscription is attempted internally).
    #[error("Live channel error: {0}")]
    Channel(String),

    /// The operation targeted a conversation view that has been closed.
    #[error("Conversation view is closed")]
    ViewClosed,

    /// Neither text nor a staged attachment was provided.
    #[error("Cannot send an empty message")]
    EmptyMessage,

    /// Message text exceeds the length limit.
    #[error("Message too long: {len} characters (max {max})")]
    MessageTooLong { len: usize, max: usize },

    /// Staged file exceeds the configured size limit.
    #[error("Attachment too large: {size} bytes (max {max})")]
    AttachmentTooLarge { size: usize, max: usize },

    /// Reading a file into the staging area failed.
    #[error("File staging failed: {0}")]
    Staging(#[from] std::io::Error),

    /// Store failures with no more specific rendering above.
    #[error("Store error: {0}")]
    Store(#[source] StoreError),
}

impl From<StoreError> for ChatError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable(_) => Self::StoreUnavailable(e),
            StoreError::SendFailed(_) => Self::SendFailed(e),
            StoreError::UploadFailed(_) => Self::UploadFailed(e),
            StoreError::PartialSend {
                file_url,
                file_name,
                source,
            } => Self::PartialSendFailure {
                file_url,
                file_name,
                source,
            },
            StoreError::Channel(msg) => Self::Channel(msg),
            StoreError::AttachmentTooLarge { size, max } => {
                Self::AttachmentTooLarge { size, max }
            }
            other => Self::Store(other),
        }
    }
}

impl ChatError {
    /// Whether retrying the same operation could succeed without further
    /// user action (e.g. re-selecting a file).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable(_) | Self::SendFailed(_) | Self::UploadFailed(_) | Self::Channel(_)
        )
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ChatError>;
