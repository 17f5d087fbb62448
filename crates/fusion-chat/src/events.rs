//! Typed events emitted by a conversation view.
//!
//! Host applications receive these over an mpsc channel and translate them
//! into whatever their UI layer needs (re-render, notification, toast).

use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use fusion_shared::types::UserId;
use fusion_shared::Message;

#[derive(Debug, Clone, Serialize)]
pub enum ChatEvent {
    /// A counterpart message arrived on the live channel and was merged.
    Received { message: Message },
    /// An optimistic send was confirmed and replaced in place.
    Confirmed { temp_id: Uuid, message: Message },
    /// A send failed and its optimistic entry was rolled back.
    SendFailed { temp_id: Uuid, reason: String },
    /// The attachment uploaded but the message row did not land; an
    /// orphaned blob exists at `file_url`.
    PartialSendFailure {
        temp_id: Uuid,
        file_url: String,
        file_name: String,
    },
    /// Messages from `counterpart` were marked read on the store.
    MarkedRead { counterpart: UserId, affected: u64 },
    /// The live channel dropped; resubscription is in progress.
    FeedDropped,
    /// The live channel came back.
    FeedResubscribed,
}

pub(crate) fn emit(tx: &mpsc::Sender<ChatEvent>, event: ChatEvent) {
    // A full or closed event queue never blocks engine progress.
    if let Err(e) = tx.try_send(event) {
        tracing::debug!(error = %e, "Dropped chat event");
    }
}
