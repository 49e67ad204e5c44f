//! Runtime for driving conversations
//!
//! One `Workspace` holds every known conversation plus the current
//! selection. The list controller and the conversation controller both
//! mutate it under a single lock, and every view is a projection of it.

mod controller;
mod list;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use controller::ConversationController;
pub use list::ConversationListController;
pub use traits::*;

use crate::conversation::{Conversation, ConversationSummary, TurnError};
use crate::council::Stage;
use crate::state_machine::TransitionError;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// Shared handle to the workspace
pub type SharedWorkspace = Arc<RwLock<Workspace>>;

/// Errors surfaced by the controllers
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("Message is empty")]
    EmptyInput,
    #[error("A council run is already in flight for {0}")]
    SubmissionInFlight(String),
    #[error("Conversation not found: {0}")]
    NotFound(String),
    #[error("Rejected event: {0}")]
    Transition(TransitionError),
    #[error("Record out of sync with state: {0}")]
    Turn(#[from] TurnError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ControllerError {
    /// Input rejections mirror a disabled send control and are not shown to the user
    #[must_use]
    pub fn is_input_rejection(&self) -> bool {
        matches!(
            self,
            ControllerError::EmptyInput | ControllerError::SubmissionInFlight(_)
        )
    }
}

/// Notifications for the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    /// Conversations were added, reordered, retitled or selected
    ListChanged,
    /// Messages of a conversation changed. `follow` is true only for the
    /// conversation on screen; other conversations must not scroll the view.
    ConversationUpdated { conversation_id: String, follow: bool },
    /// A stage failed; the failure is also attached to the record
    StageFailed {
        conversation_id: String,
        stage: Stage,
        message: String,
    },
    /// The council finished a run
    CouncilDone { conversation_id: String },
    /// Diagnostic for the status line (store failures, unknown ids)
    Diagnostic { message: String },
}

/// Single source of truth for conversations and the current selection
#[derive(Debug, Default)]
pub struct Workspace {
    /// Display order, newest first as delivered by the store
    conversations: Vec<Conversation>,
    current: Option<String>,
}

impl Workspace {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn shared() -> SharedWorkspace {
        Arc::new(RwLock::new(Self::new()))
    }

    #[must_use]
    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|c| c.id == id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    #[must_use]
    pub fn current_id(&self) -> Option<&str> {
        self.current.as_deref()
    }

    #[must_use]
    pub fn current(&self) -> Option<&Conversation> {
        self.current.as_deref().and_then(|id| self.get(id))
    }

    #[must_use]
    pub fn is_current(&self, id: &str) -> bool {
        self.current.as_deref() == Some(id)
    }

    /// Select an existing conversation; unknown ids leave the selection alone
    ///
    /// # Errors
    ///
    /// `ControllerError::NotFound` for an unknown id.
    pub fn select(&mut self, id: &str) -> Result<(), ControllerError> {
        let conv = self
            .get_mut(id)
            .ok_or_else(|| ControllerError::NotFound(id.to_string()))?;
        conv.unseen_activity = false;
        self.current = Some(id.to_string());
        Ok(())
    }

    /// Insert a newly created conversation at the front
    pub fn insert_front(&mut self, conversation: Conversation) {
        if self.contains(&conversation.id) {
            return;
        }
        self.conversations.insert(0, conversation);
    }

    #[must_use]
    pub fn summaries(&self) -> Vec<ConversationSummary> {
        self.conversations.iter().map(Conversation::summary).collect()
    }

    /// Merge a fresh listing from the store.
    ///
    /// The store's order wins for the entries it knows; entries only known
    /// locally (created but not yet listed) stay in front. Loaded histories
    /// and deliberation state are kept.
    pub fn merge_listing(&mut self, listing: Vec<ConversationSummary>) {
        let mut existing = std::mem::take(&mut self.conversations);
        let mut merged = Vec::with_capacity(listing.len() + existing.len());

        for summary in listing {
            match existing.iter().position(|c| c.id == summary.id) {
                Some(pos) => {
                    let mut conv = existing.remove(pos);
                    conv.apply_summary(&summary);
                    merged.push(conv);
                }
                None => {
                    if !merged.iter().any(|c: &Conversation| c.id == summary.id) {
                        merged.push(Conversation::from_summary(summary));
                    }
                }
            }
        }

        // Local-only entries keep their relative order ahead of the listing
        existing.extend(merged);
        self.conversations = existing;
    }
}
