//! # fusion-store
//!
//! Store client for the Fusion messaging engine: the sole gateway to the
//! remote `messages` table, attachment object storage, the user directory,
//! and the per-conversation change feed.
//!
//! The engine consumes the traits in [`traits`]; two complete backends are
//! provided: [`RemoteStore`] over HTTP and [`MemoryStore`] in-process.

pub mod config;
pub mod memory;
pub mod models;
pub mod poll;
pub mod remote;
pub mod traits;

mod error;

pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use models::{Attachment, MessageRow, NewMessageRow, Profile};
pub use poll::PollingFeed;
pub use remote::RemoteStore;
pub use traits::{
    ChangeFeed, FeedEvent, FeedSubscription, MessageStore, ObjectStore, UserDirectory,
};
