//! Conversation and live-messaging engine.
//!
//! Sits between a host UI and the message store: aggregates the inbox,
//! keeps one [`ConversationView`] per open conversation with optimistic
//! sends and live merges, and stages attachments between selection and
//! send. The store itself is reached only through the trait seams in
//! `fusion-store`, so the same engine runs against the HTTP backend or the
//! in-process one.

pub mod conversation;
pub mod error;
pub mod events;
pub mod inbox;
pub mod live;
pub mod send;
pub mod staging;
pub mod view;

pub use conversation::ConversationView;
pub use error::{ChatError, Result};
pub use events::ChatEvent;
pub use inbox::{aggregate, Conversation, Inbox};
pub use live::LiveSubscription;
pub use send::{SendOutcome, SendState};
pub use staging::{AttachmentStaging, StagedFile};
pub use view::{ViewState, VisibleMessage};

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global tracing subscriber. Call once from the host binary;
/// `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("fusion_chat=debug,fusion_store=info,warn")
    });

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
