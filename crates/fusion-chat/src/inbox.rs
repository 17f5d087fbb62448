//! Inbox aggregation.
//!
//! Folds the user's flat message list into one conversation per
//! counterpart: the latest message as the representative plus an unread
//! count. The fold is a pure function of its input — no hidden state, so
//! re-running it over the same set yields the same inbox.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use fusion_shared::types::UserId;
use fusion_shared::{Message, Session};
use fusion_store::{MessageStore, Profile, StoreError, UserDirectory};

use crate::error::Result;

/// One inbox entry: the other participant, the most recent message between
/// the two of you, and how many of their messages you have not read.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Conversation {
    pub counterpart: UserId,
    /// Directory info for the header; `None` when the lookup failed, which
    /// degrades the rendering but never the inbox.
    pub profile: Option<Profile>,
    pub latest: Message,
    pub unread: usize,
}

/// Fold `messages` into conversations for `current`.
///
/// Every message lands in exactly one partition (keyed by its counterpart);
/// the representative is the one with the greatest `created_at`, ties going
/// to the earliest in input order. The result is sorted by representative
/// timestamp, newest first; equal timestamps keep first-seen partition
/// order.
pub fn aggregate(current: UserId, messages: &[Message]) -> Vec<Conversation> {
    struct Partition {
        latest: Message,
        unread: usize,
    }

    // Insertion-ordered partitions; the index map only accelerates lookup.
    let mut partitions: Vec<(UserId, Partition)> = Vec::new();
    let mut index: HashMap<UserId, usize> = HashMap::new();

    for message in messages {
        let counterpart = message.counterpart_of(current);
        let unread = (message.receiver_id == current && !message.read) as usize;

        match index.get(&counterpart) {
            None => {
                index.insert(counterpart, partitions.len());
                partitions.push((
                    counterpart,
                    Partition {
                        latest: message.clone(),
                        unread,
                    },
                ));
            }
            Some(&i) => {
                let partition = &mut partitions[i].1;
                // Strictly-greater keeps the earliest message on a tie.
                if message.created_at > partition.latest.created_at {
                    partition.latest = message.clone();
                }
                partition.unread += unread;
            }
        }
    }

    let mut conversations: Vec<Conversation> = partitions
        .into_iter()
        .map(|(counterpart, partition)| Conversation {
            counterpart,
            profile: None,
            latest: partition.latest,
            unread: partition.unread,
        })
        .collect();

    // Stable: equal timestamps keep first-seen order.
    conversations.sort_by(|x, y| y.latest.created_at.cmp(&x.latest.created_at));
    conversations
}

/// The user's inbox: one store round trip, aggregated client-side.
pub struct Inbox {
    session: Session,
    store: Arc<dyn MessageStore>,
    directory: Arc<dyn UserDirectory>,
}

impl Inbox {
    pub fn new(
        session: Session,
        store: Arc<dyn MessageStore>,
        directory: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            session,
            store,
            directory,
        }
    }

    /// Fetch every message involving the current user, fold into
    /// conversations, and decorate each with directory display info.
    pub async fn refresh(&self) -> Result<Vec<Conversation>> {
        let messages = self.store.fetch_all_for(self.session.user_id).await?;
        let mut conversations = aggregate(self.session.user_id, &messages);

        for conversation in conversations.iter_mut() {
            match self.directory.fetch_profile(conversation.counterpart).await {
                Ok(profile) => conversation.profile = Some(profile),
                Err(StoreError::NotFound) => {
                    debug!(counterpart = %conversation.counterpart, "No directory entry");
                }
                Err(e) => {
                    debug!(counterpart = %conversation.counterpart, error = %e, "Profile lookup failed");
                }
            }
        }

        debug!(
            user = %self.session.user_id,
            conversations = conversations.len(),
            "Inbox refreshed"
        );
        Ok(conversations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use fusion_shared::MessageBody;
    use fusion_store::MemoryStore;
    use uuid::Uuid;

    fn message_at(
        sender: UserId,
        receiver: UserId,
        text: &str,
        offset_secs: i64,
        read: bool,
    ) -> Message {
        Message {
            id: Uuid::new_v4(),
            sender_id: sender,
            receiver_id: receiver,
            body: MessageBody::Text(text.into()),
            created_at: Utc::now() + Duration::seconds(offset_secs),
            read,
        }
    }

    #[test]
    fn partitions_cover_input_exactly() {
        let me = UserId::new();
        let (a, b, c) = (UserId::new(), UserId::new(), UserId::new());
        let messages = vec![
            message_at(a, me, "1", 0, false),
            message_at(me, b, "2", 1, false),
            message_at(c, me, "3", 2, true),
            message_at(me, a, "4", 3, false),
            message_at(b, me, "5", 4, false),
        ];

        let conversations = aggregate(me, &messages);

        // Union of partitions equals the input set, pairwise disjoint:
        // every message's counterpart names exactly one conversation.
        let mut per_partition = HashMap::new();
        for m in &messages {
            *per_partition.entry(m.counterpart_of(me)).or_insert(0) += 1;
        }
        assert_eq!(conversations.len(), per_partition.len());
        let total: usize = per_partition.values().sum();
        assert_eq!(total, messages.len());
    }

    #[test]
    fn aggregation_is_deterministic() {
        let me = UserId::new();
        let (a, b) = (UserId::new(), UserId::new());
        let messages = vec![
            message_at(a, me, "x", 0, false),
            message_at(b, me, "y", 0, false),
            message_at(me, a, "z", 0, false),
        ];

        let first = aggregate(me, &messages);
        let second = aggregate(me, &messages);
        assert_eq!(first, second);
    }

    #[test]
    fn representative_is_latest_and_unread_counts_receiver_only() {
        let me = UserId::new();
        let a = UserId::new();
        let messages = vec![
            message_at(a, me, "old unread", 0, false),
            message_at(me, a, "mine", 1, false),
            message_at(a, me, "new unread", 2, false),
        ];

        let conversations = aggregate(me, &messages);
        assert_eq!(conversations.len(), 1);
        let conv = &conversations[0];
        assert_eq!(conv.latest.content(), "new unread");
        // Own unsent-read messages never count.
        assert_eq!(conv.unread, 2);
    }

    #[test]
    fn five_messages_two_counterparts() {
        let me = UserId::new();
        let (a, b) = (UserId::new(), UserId::new());
        let messages = vec![
            message_at(a, me, "a1", 0, true),
            message_at(me, a, "a2", 10, false),
            message_at(a, me, "a3", 20, false),
            message_at(b, me, "b1", 5, false),
            message_at(me, b, "b2", 15, false),
        ];

        let conversations = aggregate(me, &messages);
        assert_eq!(conversations.len(), 2);

        // Sorted newest-first by representative.
        assert_eq!(conversations[0].counterpart, a);
        assert_eq!(conversations[0].latest.content(), "a3");
        assert_eq!(conversations[0].unread, 1);
        assert_eq!(conversations[1].counterpart, b);
        assert_eq!(conversations[1].latest.content(), "b2");
        assert_eq!(conversations[1].unread, 1);
    }

    #[test]
    fn empty_input_produces_no_conversations() {
        assert!(aggregate(UserId::new(), &[]).is_empty());
    }

    #[tokio::test]
    async fn refresh_decorates_with_profiles() {
        let store = Arc::new(MemoryStore::new());
        let me = UserId::new();
        let other = UserId::new();
        store
            .insert_profile(Profile {
                id: other,
                first_name: Some("Francine".into()),
                last_name: Some("Puzon".into()),
                profile_picture: None,
            })
            .await;
        store.send(other, me, "hello", None).await.unwrap();

        let inbox = Inbox::new(Session::new(me), store.clone(), store.clone());
        let conversations = inbox.refresh().await.unwrap();

        assert_eq!(conversations.len(), 1);
        let profile = conversations[0].profile.as_ref().unwrap();
        assert_eq!(profile.display_name(), "Francine Puzon");
        assert_eq!(conversations[0].unread, 1);
    }

    #[tokio::test]
    async fn refresh_survives_missing_profiles() {
        let store = Arc::new(MemoryStore::new());
        let me = UserId::new();
        let stranger = UserId::new();
        store.send(stranger, me, "hi", None).await.unwrap();

        let inbox = Inbox::new(Session::new(me), store.clone(), store.clone());
        let conversations = inbox.refresh().await.unwrap();
        assert_eq!(conversations.len(), 1);
        assert!(conversations[0].profile.is_none());
    }
}
