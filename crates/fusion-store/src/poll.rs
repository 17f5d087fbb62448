//! Polling change feed.
//!
//! For deployments where the hosted store exposes no push channel, this
//! feed emulates one: a background task re-reads the conversation on an
//! interval and emits an [`FeedEvent::Inserted`] for every durable id it
//! has not seen before. The first poll primes the seen-set silently, since
//! the consumer fetches history itself before subscribing.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use fusion_shared::types::ConversationKey;

use crate::error::Result;
use crate::traits::{ChangeFeed, FeedEvent, FeedSubscription, MessageStore};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
const FEED_BUFFER: usize = 64;

/// A [`ChangeFeed`] built by diffing repeated reads of a [`MessageStore`].
#[derive(Clone)]
pub struct PollingFeed<S> {
    store: Arc<S>,
    interval: Duration,
}

impl<S: MessageStore + 'static> PollingFeed<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_interval(store: Arc<S>, interval: Duration) -> Self {
        Self { store, interval }
    }
}

#[async_trait]
impl<S: MessageStore + 'static> ChangeFeed for PollingFeed<S> {
    async fn subscribe(&self, key: ConversationKey) -> Result<FeedSubscription> {
        let topic = key.topic();
        let (events_tx, events_rx) = mpsc::channel(FEED_BUFFER);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let store = self.store.clone();
        let interval = self.interval;
        let (a, b) = key.pair();
        let task_topic = topic.clone();

        tokio::spawn(async move {
            let mut seen: Option<HashSet<uuid::Uuid>> = None;
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        let messages = match store.fetch_conversation(a, b).await {
                            Ok(messages) => messages,
                            Err(e) => {
                                warn!(topic = %task_topic, error = %e, "Poll failed, dropping feed");
                                let _ = events_tx.send(FeedEvent::Dropped).await;
                                break;
                            }
                        };

                        match seen.as_mut() {
                            None => {
                                // Prime silently on the first successful poll.
                                seen = Some(messages.iter().map(|m| m.id).collect());
                            }
                            Some(seen) => {
                                for message in messages {
                                    if seen.insert(message.id) {
                                        debug!(topic = %task_topic, id = %message.id, "Poll found new message");
                                        if events_tx.send(FeedEvent::Inserted(message)).await.is_err() {
                                            return;
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        });

        Ok(FeedSubscription::new(topic, events_rx, shutdown_tx))
    }
}
