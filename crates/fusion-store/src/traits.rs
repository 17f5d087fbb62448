//! Store-facing trait seams consumed by the messaging engine.
//!
//! The engine holds these as trait objects so the same code runs against the
//! HTTP-backed [`RemoteStore`](crate::RemoteStore) in production and the
//! in-process [`MemoryStore`](crate::MemoryStore) in tests.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use fusion_shared::types::{ConversationKey, UserId};
use fusion_shared::Message;

use crate::error::Result;
use crate::models::{Attachment, Profile};

/// The message table gateway. Sole path to message persistence.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Every message between `a` and `b` (either direction), ascending by
    /// `created_at`. Fails with `StoreError::Unavailable` on transport error.
    async fn fetch_conversation(&self, a: UserId, b: UserId) -> Result<Vec<Message>>;

    /// Every message where `user` is sender or receiver, in one round trip.
    /// Unordered; used by the inbox aggregator.
    async fn fetch_all_for(&self, user: UserId) -> Result<Vec<Message>>;

    /// Persist a new message, uploading the attachment first when present.
    /// Returns the confirmed message with its durable id and store timestamp.
    async fn send(
        &self,
        sender: UserId,
        receiver: UserId,
        content: &str,
        attachment: Option<Attachment>,
    ) -> Result<Message>;

    /// Flip `read` for every unread message from `sender` to `receiver`.
    /// Idempotent; returns the number of rows affected.
    async fn mark_read(&self, receiver: UserId, sender: UserId) -> Result<u64>;
}

/// Binary object storage for attachments.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload under `path`, returning a stable public reference.
    async fn upload(&self, path: &str, attachment: &Attachment) -> Result<String>;
}

/// Read-only lookup of display info for conversation headers.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn fetch_profile(&self, user: UserId) -> Result<Profile>;
}

/// An event delivered on a conversation's live channel.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// A message row was inserted. May include rows the subscriber already
    /// knows about (its own optimistic sends); deduplication is the
    /// consumer's job.
    Inserted(Message),
    /// The underlying channel dropped. The subscription is dead after this;
    /// consumers resubscribe.
    Dropped,
}

/// Cancellable handle on a live change subscription.
///
/// Dropping the handle (or calling [`close`](FeedSubscription::close))
/// stops delivery deterministically; no events arrive afterwards.
#[derive(Debug)]
pub struct FeedSubscription {
    topic: String,
    events: mpsc::Receiver<FeedEvent>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl FeedSubscription {
    pub fn new(
        topic: String,
        events: mpsc::Receiver<FeedEvent>,
        shutdown: oneshot::Sender<()>,
    ) -> Self {
        Self {
            topic,
            events,
            shutdown: Some(shutdown),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Next event, or `None` once the feed has ended.
    pub async fn recv(&mut self) -> Option<FeedEvent> {
        self.events.recv().await
    }

    /// Stop delivery. Idempotent.
    pub fn close(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.events.close();
    }
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        self.close();
    }
}

/// Change-notification source scoped to a conversation's canonical topic.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn subscribe(&self, key: ConversationKey) -> Result<FeedSubscription>;
}
