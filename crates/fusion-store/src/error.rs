use thiserror::Error;

/// Errors produced by the store layer.
///
/// The split between [`SendFailed`](StoreError::SendFailed),
/// [`UploadFailed`](StoreError::UploadFailed) and
/// [`PartialSend`](StoreError::PartialSend) matters to callers: a partial
/// send means the attachment binary is already durable while the message row
/// is not, so the user must not be told "nothing happened".
#[derive(Error, Debug)]
pub enum StoreError {
    /// Transport/network failure on a read path.
    #[error("Store unavailable: {0}")]
    Unavailable(#[source] anyhow::Error),

    /// Message row insert rejected (no attachment involved, or the
    /// attachment was never uploaded).
    #[error("Send failed: {0}")]
    SendFailed(#[source] anyhow::Error),

    /// Attachment binary failed to upload; nothing was persisted.
    #[error("Attachment upload failed: {0}")]
    UploadFailed(#[source] anyhow::Error),

    /// The attachment uploaded but the row insert failed, leaving an
    /// orphaned blob behind. The blob is not retried or cleaned up here.
    #[error("Message insert failed after upload; orphaned attachment at {file_url}")]
    PartialSend {
        file_url: String,
        file_name: String,
        #[source]
        source: anyhow::Error,
    },

    /// Live change-feed subscription dropped.
    #[error("Live channel error: {0}")]
    Channel(String),

    /// A query expected exactly one row but found none.
    #[error("Record not found")]
    NotFound,

    /// A remote row violated a model invariant (e.g. an attachment
    /// reference with only one of file_url/file_name populated).
    #[error("Invalid row: {0}")]
    InvalidRow(String),

    /// Attachment exceeds the configured size limit.
    #[error("Attachment too large: {size} bytes (max {max})")]
    AttachmentTooLarge { size: usize, max: usize },
}

impl StoreError {
    pub fn unavailable<E: Into<anyhow::Error>>(e: E) -> Self {
        Self::Unavailable(e.into())
    }

    pub fn send_failed<E: Into<anyhow::Error>>(e: E) -> Self {
        Self::SendFailed(e.into())
    }

    pub fn upload_failed<E: Into<anyhow::Error>>(e: E) -> Self {
        Self::UploadFailed(e.into())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
