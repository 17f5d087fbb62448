//! Shared visible-list state for an open conversation.
//!
//! Three producers mutate the list: the optimistic send path, its
//! confirmation continuation, and the live merge task. All of them go
//! through [`ViewState::apply`], which folds against the current published
//! list under the lock — a mutation computed from a stale snapshot cannot
//! drop a concurrent merge.
//!
//! Once the view is closed every mutation becomes a no-op, so late
//! completions of in-flight work cannot update state that no longer has a
//! consumer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use uuid::Uuid;

use fusion_shared::types::UserId;
use fusion_shared::Message;

/// A list entry: a message plus whether it is still awaiting confirmation.
///
/// The optimistic flag never leaves the process; it exists so the UI can
/// render in-flight sends differently and so merges can tell a durable row
/// from a placeholder.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct VisibleMessage {
    pub message: Message,
    pub optimistic: bool,
}

#[derive(Debug, Default)]
struct Shared {
    entries: Mutex<Vec<VisibleMessage>>,
    closed: AtomicBool,
}

/// Handle on the visible message list. Cheap to clone; all clones observe
/// the same list.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    shared: Arc<Shared>,
}

impl ViewState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a mutation against the current published list. No-op once the
    /// view is closed.
    pub fn apply<F: FnOnce(&mut Vec<VisibleMessage>)>(&self, f: F) {
        if self.is_closed() {
            return;
        }
        let mut entries = self.shared.entries.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut entries);
    }

    pub fn snapshot(&self) -> Vec<VisibleMessage> {
        self.shared
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Just the messages, in display order.
    pub fn messages(&self) -> Vec<Message> {
        self.snapshot().into_iter().map(|e| e.message).collect()
    }

    pub fn len(&self) -> usize {
        self.shared
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mark the view closed. Every subsequent mutation is discarded.
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    // -- list edits ---------------------------------------------------------

    /// Append an in-flight send at the tail. Display order is submission
    /// order; the entry is replaced in place on confirmation rather than
    /// re-sorted.
    pub fn append_optimistic(&self, message: Message) {
        self.apply(|entries| {
            entries.push(VisibleMessage {
                message,
                optimistic: true,
            });
        });
    }

    /// Replace the optimistic entry `temp_id` with the confirmed message,
    /// preserving its position. If the durable row already arrived through
    /// the live channel, the optimistic entry is removed instead so the
    /// durable id appears exactly once, whichever response came first.
    pub fn confirm(&self, temp_id: Uuid, confirmed: Message) {
        self.apply(|entries| {
            let durable_present = entries
                .iter()
                .any(|e| !e.optimistic && e.message.id == confirmed.id);
            if durable_present {
                entries.retain(|e| !(e.optimistic && e.message.id == temp_id));
                return;
            }
            if let Some(entry) = entries
                .iter_mut()
                .find(|e| e.optimistic && e.message.id == temp_id)
            {
                *entry = VisibleMessage {
                    message: confirmed,
                    optimistic: false,
                };
            } else {
                // The optimistic entry is gone (e.g. a refresh replaced the
                // list); the confirmed row still belongs in the view.
                entries.push(VisibleMessage {
                    message: confirmed,
                    optimistic: false,
                });
            }
        });
    }

    /// Remove a failed send's optimistic entry.
    pub fn rollback(&self, temp_id: Uuid) {
        self.apply(|entries| {
            entries.retain(|e| !(e.optimistic && e.message.id == temp_id));
        });
    }

    /// Merge a live-channel insert. Returns false (and leaves the list
    /// untouched) when the durable id is already present.
    pub fn merge_live(&self, message: Message) -> bool {
        let mut appended = false;
        self.apply(|entries| {
            let exists = entries
                .iter()
                .any(|e| !e.optimistic && e.message.id == message.id);
            if !exists {
                entries.push(VisibleMessage {
                    message,
                    optimistic: false,
                });
                appended = true;
            }
        });
        appended
    }

    /// Flip the read flag on every message from `sender`, mirroring a
    /// store-side mark-read. Monotonic: never flips true back to false.
    pub fn mark_read_from(&self, sender: UserId) {
        self.apply(|entries| {
            for entry in entries.iter_mut() {
                if entry.message.sender_id == sender {
                    entry.message.read = true;
                }
            }
        });
    }

    /// Replace the confirmed portion of the list with freshly fetched
    /// history, keeping still-pending optimistic entries at the tail.
    pub fn replace_history(&self, history: Vec<Message>) {
        self.apply(|entries| {
            let pending: Vec<VisibleMessage> =
                entries.iter().filter(|e| e.optimistic).cloned().collect();
            entries.clear();
            entries.extend(history.into_iter().map(|message| VisibleMessage {
                message,
                optimistic: false,
            }));
            entries.extend(pending);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fusion_shared::MessageBody;

    fn message(id: Uuid, sender: UserId, receiver: UserId, text: &str) -> Message {
        Message {
            id,
            sender_id: sender,
            receiver_id: receiver,
            body: MessageBody::Text(text.into()),
            created_at: Utc::now(),
            read: false,
        }
    }

    fn ids(state: &ViewState) -> Vec<Uuid> {
        state.messages().iter().map(|m| m.id).collect()
    }

    #[test]
    fn confirm_replaces_in_place() {
        let state = ViewState::new();
        let (a, b) = (UserId::new(), UserId::new());

        let first = message(Uuid::new_v4(), b, a, "earlier");
        state.merge_live(first.clone());

        let temp_id = Uuid::new_v4();
        state.append_optimistic(message(temp_id, a, b, "hi"));

        let durable = message(Uuid::new_v4(), a, b, "hi");
        state.confirm(temp_id, durable.clone());

        // Same position, temp id gone, durable id present exactly once.
        assert_eq!(ids(&state), vec![first.id, durable.id]);
        assert!(state.snapshot().iter().all(|e| !e.optimistic));
    }

    #[test]
    fn confirm_after_live_echo_keeps_one_copy() {
        let state = ViewState::new();
        let (a, b) = (UserId::new(), UserId::new());

        let temp_id = Uuid::new_v4();
        state.append_optimistic(message(temp_id, a, b, "hi"));

        // The live channel echoes the durable row before the send resolves.
        let durable = message(Uuid::new_v4(), a, b, "hi");
        assert!(state.merge_live(durable.clone()));

        state.confirm(temp_id, durable.clone());
        assert_eq!(ids(&state), vec![durable.id]);
    }

    #[test]
    fn merge_live_deduplicates_by_durable_id() {
        let state = ViewState::new();
        let (a, b) = (UserId::new(), UserId::new());
        let msg = message(Uuid::new_v4(), b, a, "ping");

        assert!(state.merge_live(msg.clone()));
        assert!(!state.merge_live(msg.clone()));
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn rollback_restores_previous_id_set() {
        let state = ViewState::new();
        let (a, b) = (UserId::new(), UserId::new());
        let existing = message(Uuid::new_v4(), b, a, "before");
        state.merge_live(existing.clone());
        let before = ids(&state);

        let temp_id = Uuid::new_v4();
        state.append_optimistic(message(temp_id, a, b, "doomed"));
        state.rollback(temp_id);

        assert_eq!(ids(&state), before);
    }

    #[test]
    fn mark_read_is_monotonic() {
        let state = ViewState::new();
        let (a, b) = (UserId::new(), UserId::new());
        let mut incoming = message(Uuid::new_v4(), b, a, "unread");
        incoming.read = false;
        state.merge_live(incoming);

        state.mark_read_from(b);
        assert!(state.messages()[0].read);

        // A second pass never reverts the flag.
        state.mark_read_from(b);
        assert!(state.messages()[0].read);
    }

    #[test]
    fn closed_view_discards_mutations() {
        let state = ViewState::new();
        let (a, b) = (UserId::new(), UserId::new());
        state.close();

        state.append_optimistic(message(Uuid::new_v4(), a, b, "late"));
        assert!(state.merge_live(message(Uuid::new_v4(), b, a, "late")) == false);
        assert!(state.is_empty());
    }

    #[test]
    fn replace_history_keeps_pending_sends() {
        let state = ViewState::new();
        let (a, b) = (UserId::new(), UserId::new());

        let temp_id = Uuid::new_v4();
        state.append_optimistic(message(temp_id, a, b, "pending"));

        let history = vec![
            message(Uuid::new_v4(), b, a, "one"),
            message(Uuid::new_v4(), a, b, "two"),
        ];
        state.replace_history(history.clone());

        let snapshot = state.snapshot();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot[2].message.id, temp_id);
        assert!(snapshot[2].optimistic);
    }
}
