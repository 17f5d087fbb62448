//! Live update subscriber for an open conversation.
//!
//! One background task per open view: it subscribes to the conversation's
//! canonical topic, merges inserts into the shared [`ViewState`], and keeps
//! resubscribing with exponential backoff when the channel drops. The
//! handle cancels the task deterministically on close or drop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use fusion_shared::types::ConversationKey;
use fusion_shared::Session;
use fusion_store::{ChangeFeed, FeedEvent, MessageStore};

use crate::events::{emit, ChatEvent};
use crate::view::ViewState;

const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Cancellable handle on a running live-merge task.
///
/// Dropping the handle stops the task; [`stop`](LiveSubscription::stop)
/// does the same but waits for it to finish.
#[derive(Debug)]
pub struct LiveSubscription {
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl LiveSubscription {
    pub(crate) fn spawn(
        session: Session,
        key: ConversationKey,
        feed: Arc<dyn ChangeFeed>,
        store: Arc<dyn MessageStore>,
        state: ViewState,
        events: mpsc::Sender<ChatEvent>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run(
            session,
            key,
            feed,
            store,
            state,
            events,
            shutdown_rx,
        ));
        Self {
            shutdown: Some(shutdown_tx),
            task: Some(task),
        }
    }

    /// Stop the merge task and wait for it to exit. Idempotent.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for LiveSubscription {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

async fn run(
    session: Session,
    key: ConversationKey,
    feed: Arc<dyn ChangeFeed>,
    store: Arc<dyn MessageStore>,
    state: ViewState,
    events: mpsc::Sender<ChatEvent>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let topic = key.topic();
    let mut backoff = INITIAL_BACKOFF;
    let mut first_attach = true;

    loop {
        if state.is_closed() {
            return;
        }

        let mut subscription = tokio::select! {
            _ = &mut shutdown => return,
            result = feed.subscribe(key) => match result {
                Ok(sub) => sub,
                Err(e) => {
                    warn!(topic = %topic, error = %e, "Subscribe failed, backing off");
                    tokio::select! {
                        _ = &mut shutdown => return,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                    continue;
                }
            },
        };

        backoff = INITIAL_BACKOFF;
        if first_attach {
            debug!(topic = %topic, "Live channel attached");
            first_attach = false;
        } else {
            info!(topic = %topic, "Live channel reattached");
            emit(&events, ChatEvent::FeedResubscribed);
        }

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    subscription.close();
                    return;
                }
                event = subscription.recv() => match event {
                    Some(FeedEvent::Inserted(message)) => {
                        if state.is_closed() {
                            return;
                        }
                        // Topic filters already scope delivery; guard against
                        // a misrouted row anyway.
                        if !key.matches(message.sender_id, message.receiver_id) {
                            continue;
                        }
                        let from_counterpart = message.receiver_id == session.user_id;
                        let sender = message.sender_id;
                        if !state.merge_live(message.clone()) {
                            debug!(id = %message.id, "Duplicate live insert ignored");
                            continue;
                        }
                        emit(&events, ChatEvent::Received { message });
                        // A message arriving while the view is open is read
                        // immediately, store-side and locally.
                        if from_counterpart {
                            match store.mark_read(session.user_id, sender).await {
                                Ok(affected) => {
                                    state.mark_read_from(sender);
                                    emit(&events, ChatEvent::MarkedRead {
                                        counterpart: sender,
                                        affected,
                                    });
                                }
                                Err(e) => {
                                    warn!(error = %e, "mark_read after live insert failed");
                                }
                            }
                        }
                    }
                    Some(FeedEvent::Dropped) | None => {
                        warn!(topic = %topic, "Live channel dropped, resubscribing");
                        emit(&events, ChatEvent::FeedDropped);
                        break;
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fusion_shared::types::UserId;
    use fusion_store::MemoryStore;
    use std::time::Duration;

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn counterpart_message_is_merged_and_marked_read() {
        let store = Arc::new(MemoryStore::new());
        let me = UserId::new();
        let other = UserId::new();
        let key = ConversationKey::new(me, other);
        let state = ViewState::new();
        let (tx, mut rx) = mpsc::channel(16);

        let sub = LiveSubscription::spawn(
            Session::new(me),
            key,
            store.clone(),
            store.clone(),
            state.clone(),
            tx,
        );
        settle().await;

        store.send(other, me, "hello", None).await.unwrap();
        settle().await;

        let messages = state.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content(), "hello");
        // Marked read both on the store and locally.
        assert!(messages[0].read);
        assert_eq!(store.mark_read(me, other).await.unwrap(), 0);

        assert!(matches!(rx.recv().await, Some(ChatEvent::Received { .. })));
        assert!(matches!(rx.recv().await, Some(ChatEvent::MarkedRead { .. })));

        sub.stop().await;
    }

    #[tokio::test]
    async fn own_echo_is_merged_without_mark_read() {
        let store = Arc::new(MemoryStore::new());
        let me = UserId::new();
        let other = UserId::new();
        let key = ConversationKey::new(me, other);
        let state = ViewState::new();
        let (tx, mut rx) = mpsc::channel(16);

        let sub = LiveSubscription::spawn(
            Session::new(me),
            key,
            store.clone(),
            store.clone(),
            state.clone(),
            tx,
        );
        settle().await;

        // A send from this user on another device echoes back on the topic.
        store.send(me, other, "from elsewhere", None).await.unwrap();
        settle().await;

        assert_eq!(state.len(), 1);
        assert!(!state.messages()[0].read);
        assert!(matches!(rx.recv().await, Some(ChatEvent::Received { .. })));
        assert!(rx.try_recv().is_err());

        sub.stop().await;
    }

    #[tokio::test]
    async fn stop_halts_delivery() {
        let store = Arc::new(MemoryStore::new());
        let me = UserId::new();
        let other = UserId::new();
        let key = ConversationKey::new(me, other);
        let state = ViewState::new();
        let (tx, _rx) = mpsc::channel(16);

        let sub = LiveSubscription::spawn(
            Session::new(me),
            key,
            store.clone(),
            store.clone(),
            state.clone(),
            tx,
        );
        settle().await;
        sub.stop().await;

        store.send(other, me, "after stop", None).await.unwrap();
        settle().await;
        assert!(state.is_empty());
    }
}
