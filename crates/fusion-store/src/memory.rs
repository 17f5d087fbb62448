//! In-process store backend.
//!
//! A complete implementation of every store trait, backed by tokio
//! synchronization primitives. Serves two purposes: the engine's test
//! double, and a self-contained local mode where both participants run in
//! one process (classroom demos, offline development).
//!
//! Inserts are fanned out on a per-topic broadcast channel, so the
//! [`ChangeFeed`] behaves like a real push channel including the echo of
//! the sender's own messages.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{broadcast, mpsc, oneshot, Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

use fusion_shared::constants::MAX_ATTACHMENT_SIZE;
use fusion_shared::types::{ConversationKey, UserId};
use fusion_shared::{Message, MessageBody};

use crate::error::{Result, StoreError};
use crate::models::{Attachment, MessageRow, Profile};
use crate::traits::{
    ChangeFeed, FeedEvent, FeedSubscription, MessageStore, ObjectStore, UserDirectory,
};

const FEED_BUFFER: usize = 64;

#[derive(Debug, Default)]
struct Inner {
    rows: RwLock<Vec<MessageRow>>,
    profiles: RwLock<HashMap<UserId, Profile>>,
    topics: Mutex<HashMap<String, broadcast::Sender<Message>>>,
    fail_next_insert: AtomicBool,
    fail_next_upload: AtomicBool,
}

/// In-memory store implementing every store-facing trait.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user-directory entry.
    pub async fn insert_profile(&self, profile: Profile) {
        self.inner
            .profiles
            .write()
            .await
            .insert(profile.id, profile);
    }

    /// Insert a pre-existing row directly, bypassing send semantics and the
    /// change feed. For seeding history in tests and imports.
    pub async fn seed(&self, row: MessageRow) {
        self.inner.rows.write().await.push(row);
    }

    /// Make the next row insert fail with `SendFailed` (or `PartialSend`
    /// when it follows a successful upload).
    pub fn fail_next_insert(&self) {
        self.inner.fail_next_insert.store(true, Ordering::SeqCst);
    }

    /// Make the next attachment upload fail with `UploadFailed`.
    pub fn fail_next_upload(&self) {
        self.inner.fail_next_upload.store(true, Ordering::SeqCst);
    }

    async fn publish(&self, message: &Message) {
        let key = ConversationKey::new(message.sender_id, message.receiver_id);
        let topics = self.inner.topics.lock().await;
        if let Some(tx) = topics.get(&key.topic()) {
            // No subscribers is fine; the send result only reports that.
            let _ = tx.send(message.clone());
        }
    }

    async fn topic_sender(&self, topic: &str) -> broadcast::Sender<Message> {
        let mut topics = self.inner.topics.lock().await;
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(FEED_BUFFER).0)
            .clone()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn fetch_conversation(&self, a: UserId, b: UserId) -> Result<Vec<Message>> {
        let rows = self.inner.rows.read().await;
        let mut messages: Vec<Message> = rows
            .iter()
            .filter(|r| {
                (r.sender_id == a && r.receiver_id == b)
                    || (r.sender_id == b && r.receiver_id == a)
            })
            .cloned()
            .map(Message::try_from)
            .collect::<Result<_>>()?;
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }

    async fn fetch_all_for(&self, user: UserId) -> Result<Vec<Message>> {
        let rows = self.inner.rows.read().await;
        rows.iter()
            .filter(|r| r.sender_id == user || r.receiver_id == user)
            .cloned()
            .map(Message::try_from)
            .collect()
    }

    async fn send(
        &self,
        sender: UserId,
        receiver: UserId,
        content: &str,
        attachment: Option<Attachment>,
    ) -> Result<Message> {
        let body = match attachment {
            None => MessageBody::Text(content.trim().to_string()),
            Some(attachment) => {
                let path = format!("{}-{}", Utc::now().timestamp_millis(), attachment.file_name);
                let file_url = self.upload(&path, &attachment).await?;
                if self.inner.fail_next_insert.swap(false, Ordering::SeqCst) {
                    return Err(StoreError::PartialSend {
                        file_url,
                        file_name: attachment.file_name,
                        source: anyhow::anyhow!("injected insert failure"),
                    });
                }
                MessageBody::attachment(content, file_url, attachment.file_name)
            }
        };

        if self.inner.fail_next_insert.swap(false, Ordering::SeqCst) {
            return Err(StoreError::send_failed(anyhow::anyhow!(
                "injected insert failure"
            )));
        }

        let message = Message {
            id: Uuid::new_v4(),
            sender_id: sender,
            receiver_id: receiver,
            body,
            created_at: Utc::now(),
            read: false,
        };
        self.inner.rows.write().await.push(MessageRow::from(&message));
        self.publish(&message).await;
        debug!(id = %message.id, "Stored message");
        Ok(message)
    }

    async fn mark_read(&self, receiver: UserId, sender: UserId) -> Result<u64> {
        let mut rows = self.inner.rows.write().await;
        let mut affected = 0;
        for row in rows.iter_mut() {
            if row.receiver_id == receiver && row.sender_id == sender && !row.read {
                row.read = true;
                affected += 1;
            }
        }
        Ok(affected)
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn upload(&self, path: &str, attachment: &Attachment) -> Result<String> {
        if self.inner.fail_next_upload.swap(false, Ordering::SeqCst) {
            return Err(StoreError::upload_failed(anyhow::anyhow!(
                "injected upload failure"
            )));
        }
        if attachment.size() > MAX_ATTACHMENT_SIZE {
            return Err(StoreError::AttachmentTooLarge {
                size: attachment.size(),
                max: MAX_ATTACHMENT_SIZE,
            });
        }
        Ok(format!("memory://attachments/{path}"))
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn fetch_profile(&self, user: UserId) -> Result<Profile> {
        self.inner
            .profiles
            .read()
            .await
            .get(&user)
            .cloned()
            .ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl ChangeFeed for MemoryStore {
    async fn subscribe(&self, key: ConversationKey) -> Result<FeedSubscription> {
        let topic = key.topic();
        let mut rx = self.topic_sender(&topic).await.subscribe();
        let (events_tx, events_rx) = mpsc::channel(FEED_BUFFER);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let task_topic = topic.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    event = rx.recv() => match event {
                        Ok(message) => {
                            if events_tx.send(FeedEvent::Inserted(message)).await.is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            debug!(topic = %task_topic, skipped, "Feed lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            let _ = events_tx.send(FeedEvent::Dropped).await;
                            break;
                        }
                    },
                }
            }
        });

        Ok(FeedSubscription::new(topic, events_rx, shutdown_tx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_assigns_id_and_timestamp() {
        let store = MemoryStore::new();
        let (a, b) = (UserId::new(), UserId::new());

        let msg = store.send(a, b, "hello", None).await.unwrap();
        assert!(!msg.read);
        assert_eq!(msg.content(), "hello");

        let history = store.fetch_conversation(a, b).await.unwrap();
        assert_eq!(history, vec![msg]);
    }

    #[tokio::test]
    async fn fetch_conversation_is_scoped_and_ordered() {
        let store = MemoryStore::new();
        let (a, b, c) = (UserId::new(), UserId::new(), UserId::new());

        store.send(a, b, "first", None).await.unwrap();
        store.send(b, a, "second", None).await.unwrap();
        store.send(a, c, "other conversation", None).await.unwrap();

        let history = store.fetch_conversation(a, b).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].created_at <= history[1].created_at);
        assert!(history.iter().all(|m| m.is_between(a, b)));
    }

    #[tokio::test]
    async fn mark_read_is_idempotent() {
        let store = MemoryStore::new();
        let (a, b) = (UserId::new(), UserId::new());
        store.send(a, b, "one", None).await.unwrap();
        store.send(a, b, "two", None).await.unwrap();

        assert_eq!(store.mark_read(b, a).await.unwrap(), 2);
        assert_eq!(store.mark_read(b, a).await.unwrap(), 0);

        let history = store.fetch_conversation(a, b).await.unwrap();
        assert!(history.iter().all(|m| m.read));
    }

    #[tokio::test]
    async fn feed_delivers_inserts_on_the_canonical_topic() {
        let store = MemoryStore::new();
        let (a, b) = (UserId::new(), UserId::new());

        // Subscribe from b's side; the topic must match a's sends anyway.
        let mut sub = store.subscribe(ConversationKey::new(b, a)).await.unwrap();
        let sent = store.send(a, b, "ping", None).await.unwrap();

        match sub.recv().await {
            Some(FeedEvent::Inserted(msg)) => assert_eq!(msg.id, sent.id),
            other => panic!("expected insert event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn closed_subscription_stops_delivery() {
        let store = MemoryStore::new();
        let (a, b) = (UserId::new(), UserId::new());

        let mut sub = store.subscribe(ConversationKey::new(a, b)).await.unwrap();
        sub.close();
        store.send(a, b, "after close", None).await.unwrap();
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn injected_failures_map_to_error_taxonomy() {
        let store = MemoryStore::new();
        let (a, b) = (UserId::new(), UserId::new());

        store.fail_next_insert();
        let err = store.send(a, b, "text", None).await.unwrap_err();
        assert!(matches!(err, StoreError::SendFailed(_)));

        store.fail_next_upload();
        let att = Attachment::new("x.png", "image/png", vec![1, 2, 3]);
        let err = store.send(a, b, "", Some(att)).await.unwrap_err();
        assert!(matches!(err, StoreError::UploadFailed(_)));

        store.fail_next_insert();
        let att = Attachment::new("x.png", "image/png", vec![1, 2, 3]);
        let err = store.send(a, b, "", Some(att)).await.unwrap_err();
        match err {
            StoreError::PartialSend { file_name, .. } => assert_eq!(file_name, "x.png"),
            other => panic!("expected partial send, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn attachment_only_send_derives_caption() {
        let store = MemoryStore::new();
        let (a, b) = (UserId::new(), UserId::new());
        let att = Attachment::new("notes.pdf", "application/pdf", vec![0u8; 16]);

        let msg = store.send(a, b, "", Some(att)).await.unwrap();
        assert_eq!(msg.content(), "File: notes.pdf");
        let (url, name) = msg.attachment().unwrap();
        assert!(url.starts_with("memory://attachments/"));
        assert_eq!(name, "notes.pdf");
    }
}
