//! Attachment staging.
//!
//! Holds at most one user-selected file between selection and send,
//! independently of the text being composed — a caption can be typed while
//! a file sits staged. A preview is generated for image content types only.

use base64::Engine;
use tracing::debug;

use fusion_shared::constants::MAX_ATTACHMENT_SIZE;
use fusion_store::Attachment;

use crate::error::{ChatError, Result};

/// A staged file plus its optional locally rendered preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub attachment: Attachment,
    /// Base64 data URL, present only for `image/*` content types.
    pub preview: Option<String>,
}

/// At most one staged file between selection and send.
#[derive(Debug, Default)]
pub struct AttachmentStaging {
    staged: Option<StagedFile>,
}

impl AttachmentStaging {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a file, replacing any previous selection.
    pub fn stage(&mut self, attachment: Attachment) -> Result<&StagedFile> {
        if attachment.size() > MAX_ATTACHMENT_SIZE {
            return Err(ChatError::AttachmentTooLarge {
                size: attachment.size(),
                max: MAX_ATTACHMENT_SIZE,
            });
        }

        let preview = attachment.is_image().then(|| {
            format!(
                "data:{};base64,{}",
                attachment.content_type,
                base64::engine::general_purpose::STANDARD.encode(&attachment.data)
            )
        });

        debug!(
            file = %attachment.file_name,
            size = attachment.size(),
            preview = preview.is_some(),
            "Staged attachment"
        );
        Ok(self.staged.insert(StagedFile {
            attachment,
            preview,
        }))
    }

    /// Read a file from disk and stage it.
    pub async fn stage_path(
        &mut self,
        path: impl AsRef<std::path::Path>,
        content_type: impl Into<String>,
    ) -> Result<&StagedFile> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("file")
            .to_string();
        let data = tokio::fs::read(path).await?;
        self.stage(Attachment::new(file_name, content_type, data))
    }

    pub fn staged(&self) -> Option<&StagedFile> {
        self.staged.as_ref()
    }

    /// Remove and return the staged file (called at send time).
    pub fn take(&mut self) -> Option<StagedFile> {
        self.staged.take()
    }

    /// Put a staged file back after a failed upload, so the user can retry
    /// without re-selecting.
    pub fn restore(&mut self, staged: StagedFile) {
        self.staged = Some(staged);
    }

    /// Explicit user cancel.
    pub fn clear(&mut self) {
        self.staged = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn image_gets_a_data_url_preview() {
        let mut staging = AttachmentStaging::new();
        let staged = staging
            .stage(Attachment::new("photo.png", "image/png", vec![1, 2, 3]))
            .unwrap();
        let preview = staged.preview.as_deref().unwrap();
        assert!(preview.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn non_image_gets_no_preview() {
        let mut staging = AttachmentStaging::new();
        let staged = staging
            .stage(Attachment::new("notes.pdf", "application/pdf", vec![1]))
            .unwrap();
        assert!(staged.preview.is_none());
    }

    #[test]
    fn staging_replaces_previous_selection() {
        let mut staging = AttachmentStaging::new();
        staging
            .stage(Attachment::new("a.txt", "text/plain", vec![1]))
            .unwrap();
        staging
            .stage(Attachment::new("b.txt", "text/plain", vec![2]))
            .unwrap();
        assert_eq!(staging.staged().unwrap().attachment.file_name, "b.txt");
    }

    #[test]
    fn oversized_file_is_rejected_and_not_staged() {
        let mut staging = AttachmentStaging::new();
        let big = Attachment::new("big.bin", "application/octet-stream", vec![0u8; MAX_ATTACHMENT_SIZE + 1]);
        assert!(matches!(
            staging.stage(big),
            Err(ChatError::AttachmentTooLarge { .. })
        ));
        assert!(staging.staged().is_none());
    }

    #[test]
    fn take_then_restore_round_trips() {
        let mut staging = AttachmentStaging::new();
        staging
            .stage(Attachment::new("a.txt", "text/plain", vec![1]))
            .unwrap();
        let staged = staging.take().unwrap();
        assert!(staging.staged().is_none());
        staging.restore(staged);
        assert_eq!(staging.staged().unwrap().attachment.file_name, "a.txt");
    }

    #[tokio::test]
    async fn stage_path_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("homework answers.txt");
        {
            let mut f = std::fs::File::create(&path).unwrap();
            f.write_all(b"42").unwrap();
        }

        let mut staging = AttachmentStaging::new();
        let staged = staging.stage_path(&path, "text/plain").await.unwrap();
        assert_eq!(staged.attachment.file_name, "homework answers.txt");
        assert_eq!(&staged.attachment.data[..], b"42");
    }
}
