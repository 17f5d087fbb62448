//! # fusion-shared
//!
//! Domain types shared across the Fusion messaging crates: participant and
//! conversation identifiers, the `Message` model, and the explicit login
//! session handed to every component at construction time.

pub mod constants;
pub mod message;
pub mod session;
pub mod types;

pub use message::{Message, MessageBody};
pub use session::Session;
pub use types::{ConversationKey, UserId};
