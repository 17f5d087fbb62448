//! An open two-party conversation.
//!
//! [`ConversationView`] binds the shared visible list, the live merge task
//! and the attachment staging area for one counterpart. Opening it loads
//! history and marks it read; closing it tears everything down so nothing
//! mutates state after the host has navigated away.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use fusion_shared::types::{ConversationKey, UserId};
use fusion_shared::Session;
use fusion_store::{
    Attachment, ChangeFeed, MessageStore, Profile, StoreError, UserDirectory,
};

use crate::error::Result;
use crate::events::{emit, ChatEvent};
use crate::live::LiveSubscription;
use crate::staging::{AttachmentStaging, StagedFile};
use crate::view::{ViewState, VisibleMessage};

const EVENT_BUFFER: usize = 64;

/// One open conversation: history, live merges, staging and send.
pub struct ConversationView {
    pub(crate) session: Session,
    pub(crate) key: ConversationKey,
    pub(crate) counterpart: UserId,
    profile: Option<Profile>,
    pub(crate) store: Arc<dyn MessageStore>,
    pub(crate) state: ViewState,
    pub(crate) staging: Mutex<AttachmentStaging>,
    pub(crate) events: mpsc::Sender<ChatEvent>,
    live: Option<LiveSubscription>,
}

impl ConversationView {
    /// Open the conversation with `counterpart`: resolve their directory
    /// profile, load history (ascending), mark it read, and attach the live
    /// channel. Returns the view together with the event receiver.
    ///
    /// Fails with [`ChatError::StoreUnavailable`](crate::ChatError) when the
    /// history fetch fails; no half-open view is returned.
    pub async fn open(
        session: Session,
        counterpart: UserId,
        store: Arc<dyn MessageStore>,
        feed: Arc<dyn ChangeFeed>,
        directory: Arc<dyn UserDirectory>,
    ) -> Result<(Self, mpsc::Receiver<ChatEvent>)> {
        let key = ConversationKey::new(session.user_id, counterpart);

        let profile = match directory.fetch_profile(counterpart).await {
            Ok(profile) => Some(profile),
            Err(StoreError::NotFound) => None,
            Err(e) => {
                warn!(counterpart = %counterpart, error = %e, "Profile lookup failed");
                None
            }
        };

        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let mut view = Self {
            session: session.clone(),
            key,
            counterpart,
            profile,
            store: store.clone(),
            state: ViewState::new(),
            staging: Mutex::new(AttachmentStaging::new()),
            events: events_tx.clone(),
            live: None,
        };

        view.refresh().await?;
        view.live = Some(LiveSubscription::spawn(
            session,
            key,
            feed,
            store,
            view.state.clone(),
            events_tx,
        ));

        debug!(topic = %key.topic(), messages = view.state.len(), "Conversation opened");
        Ok((view, events_rx))
    }

    /// Re-fetch history and mark it read. The manual fallback when the live
    /// channel stays down; pending optimistic sends survive the refresh.
    ///
    /// On fetch failure the previous list is left untouched, so the caller
    /// can keep rendering it alongside a retry affordance.
    pub async fn refresh(&self) -> Result<()> {
        let history = self
            .store
            .fetch_conversation(self.session.user_id, self.counterpart)
            .await?;
        self.state.replace_history(history);

        match self
            .store
            .mark_read(self.session.user_id, self.counterpart)
            .await
        {
            Ok(affected) => {
                self.state.mark_read_from(self.counterpart);
                if affected > 0 {
                    emit(
                        &self.events,
                        ChatEvent::MarkedRead {
                            counterpart: self.counterpart,
                            affected,
                        },
                    );
                }
            }
            Err(e) => {
                // Unread counts recover on the next open; the history itself
                // is already in place.
                warn!(counterpart = %self.counterpart, error = %e, "mark_read failed");
            }
        }
        Ok(())
    }

    pub fn counterpart(&self) -> UserId {
        self.counterpart
    }

    /// Directory info for the header, when the lookup succeeded.
    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    pub fn topic(&self) -> String {
        self.key.topic()
    }

    /// Current visible list, display order.
    pub fn snapshot(&self) -> Vec<VisibleMessage> {
        self.state.snapshot()
    }

    pub fn is_closed(&self) -> bool {
        self.state.is_closed()
    }

    // -- staging --------------------------------------------------------------

    /// Stage an attachment for the next send, replacing any previous
    /// selection. Returns the preview data URL for image content types.
    pub async fn stage_attachment(&self, attachment: Attachment) -> Result<Option<String>> {
        let mut staging = self.staging.lock().await;
        let staged = staging.stage(attachment)?;
        Ok(staged.preview.clone())
    }

    /// Read a file from disk and stage it.
    pub async fn stage_file(
        &self,
        path: impl AsRef<std::path::Path>,
        content_type: impl Into<String>,
    ) -> Result<Option<String>> {
        let mut staging = self.staging.lock().await;
        let staged = staging.stage_path(path, content_type).await?;
        Ok(staged.preview.clone())
    }

    pub async fn staged_attachment(&self) -> Option<StagedFile> {
        self.staging.lock().await.staged().cloned()
    }

    /// Drop the staged file without sending it.
    pub async fn clear_staging(&self) {
        self.staging.lock().await.clear();
    }

    /// Tear the view down: no mutation lands after this returns, and the
    /// live merge task has exited.
    pub async fn close(&mut self) {
        self.state.close();
        if let Some(live) = self.live.take() {
            live.stop().await;
        }
        debug!(topic = %self.key.topic(), "Conversation closed");
    }
}
