//! Conversation list controller
//!
//! Owns the selection and the set of known conversations. Message content
//! is only touched to hydrate a conversation when it is opened.

use super::traits::ConversationStore;
use super::{ControllerError, SharedWorkspace, UiEvent};
use crate::conversation::Conversation;
use crate::render::{project_list, ConversationListItem};
use std::sync::Arc;
use tokio::sync::broadcast;

pub struct ConversationListController<S: ConversationStore> {
    workspace: SharedWorkspace,
    store: Arc<S>,
    events: broadcast::Sender<UiEvent>,
}

impl<S: ConversationStore> Clone for ConversationListController<S> {
    fn clone(&self) -> Self {
        Self {
            workspace: self.workspace.clone(),
            store: self.store.clone(),
            events: self.events.clone(),
        }
    }
}

impl<S: ConversationStore + 'static> ConversationListController<S> {
    #[must_use]
    pub fn new(
        workspace: SharedWorkspace,
        store: Arc<S>,
        events: broadcast::Sender<UiEvent>,
    ) -> Self {
        Self {
            workspace,
            store,
            events,
        }
    }

    #[must_use]
    pub fn workspace(&self) -> &SharedWorkspace {
        &self.workspace
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.events.subscribe()
    }

    pub(crate) fn notify(&self, event: UiEvent) {
        // No subscribers is fine: nothing is on screen yet
        let _ = self.events.send(event);
    }

    /// Reload the listing from the store
    ///
    /// # Errors
    ///
    /// `ControllerError::Store` when the listing cannot be fetched.
    pub async fn refresh(&self) -> Result<(), ControllerError> {
        let listing = match self.store.list_conversations().await {
            Ok(listing) => listing,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to list conversations");
                self.notify(UiEvent::Diagnostic {
                    message: format!("Could not load conversations: {e}"),
                });
                return Err(e.into());
            }
        };

        tracing::debug!(count = listing.len(), "Conversation listing refreshed");
        self.workspace.write().await.merge_listing(listing);
        self.notify(UiEvent::ListChanged);
        Ok(())
    }

    /// Current conversation summaries in display order
    pub async fn list(&self) -> Vec<ConversationListItem> {
        project_list(&*self.workspace.read().await)
    }

    pub async fn current_id(&self) -> Option<String> {
        self.workspace.read().await.current_id().map(String::from)
    }

    /// Select a conversation. Unknown ids fail with `NotFound` and change nothing.
    ///
    /// # Errors
    ///
    /// `ControllerError::NotFound` for an unknown id.
    pub async fn select(&self, id: &str) -> Result<(), ControllerError> {
        let selected = self.workspace.write().await.select(id);
        match selected {
            Ok(()) => {
                tracing::debug!(conv_id = %id, "Conversation selected");
                self.notify(UiEvent::ListChanged);
                self.notify(UiEvent::ConversationUpdated {
                    conversation_id: id.to_string(),
                    follow: true,
                });
                Ok(())
            }
            Err(e) => {
                tracing::warn!(conv_id = %id, "Ignoring selection of unknown conversation");
                self.notify(UiEvent::Diagnostic {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Select a conversation and load its history if only the summary is known
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id, `Store` when the history cannot be loaded.
    pub async fn open(&self, id: &str) -> Result<(), ControllerError> {
        self.select(id).await?;
        self.ensure_hydrated(id).await
    }

    /// Fetch the full history of a listed conversation once
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id, `Store` when the history cannot be loaded.
    pub async fn ensure_hydrated(&self, id: &str) -> Result<(), ControllerError> {
        {
            let ws = self.workspace.read().await;
            let conv = ws
                .get(id)
                .ok_or_else(|| ControllerError::NotFound(id.to_string()))?;
            if conv.is_hydrated() {
                return Ok(());
            }
        }

        let loaded = match self.store.get_conversation(id).await {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::warn!(conv_id = %id, error = %e, "Failed to load conversation");
                self.notify(UiEvent::Diagnostic {
                    message: format!("Could not load conversation: {e}"),
                });
                return Err(e.into());
            }
        };

        let follow = {
            let mut ws = self.workspace.write().await;
            let follow = ws.is_current(id);
            let conv = ws
                .get_mut(id)
                .ok_or_else(|| ControllerError::NotFound(id.to_string()))?;
            if conv.title.is_none() {
                conv.title.clone_from(&loaded.title);
            }
            // A submission may have started a local history while we fetched
            if !conv.hydrate(loaded.into_messages()) {
                return Ok(());
            }
            follow
        };

        tracing::debug!(conv_id = %id, "Conversation hydrated");
        self.notify(UiEvent::ListChanged);
        self.notify(UiEvent::ConversationUpdated {
            conversation_id: id.to_string(),
            follow,
        });
        Ok(())
    }

    /// Create an empty conversation, put it at the front and select it
    ///
    /// # Errors
    ///
    /// `ControllerError::Store` when the store refuses to create the conversation.
    pub async fn create_new(&self) -> Result<String, ControllerError> {
        let summary = match self.store.create_conversation().await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to create conversation");
                self.notify(UiEvent::Diagnostic {
                    message: format!("Could not create conversation: {e}"),
                });
                return Err(e.into());
            }
        };

        let id = summary.id.clone();
        {
            let mut ws = self.workspace.write().await;
            ws.insert_front(Conversation::with_messages(
                summary.id,
                summary.title,
                summary.created_at,
                Vec::new(),
            ));
            ws.select(&id)?;
        }

        tracing::info!(conv_id = %id, "Conversation created");
        self.notify(UiEvent::ListChanged);
        self.notify(UiEvent::ConversationUpdated {
            conversation_id: id.clone(),
            follow: true,
        });
        Ok(id)
    }
}
