/// Remote table holding message rows.
pub const MESSAGES_TABLE: &str = "messages";

/// Remote table holding user directory rows.
pub const USERS_TABLE: &str = "users";

/// Object-storage bucket for message attachments.
pub const ATTACHMENT_BUCKET: &str = "message-attachments";

/// Maximum attachment size in bytes (50 MiB).
pub const MAX_ATTACHMENT_SIZE: usize = 50 * 1024 * 1024;

/// Maximum message text length in characters.
pub const MAX_MESSAGE_LEN: usize = 4096;
