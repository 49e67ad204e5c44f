//! Trait abstractions for the external collaborators
//!
//! The council pipeline and the conversation store live outside this crate.
//! These traits enable testing the controllers with mock implementations.

use crate::conversation::{Conversation, ConversationSummary};
use crate::council::{PipelineError, PipelineEvent};
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// Ordered stream of events for one council run
pub type PipelineStream = Pin<Box<dyn Stream<Item = Result<PipelineEvent, PipelineError>> + Send>>;

/// Errors from the conversation store
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Conversation not found: {0}")]
    NotFound(String),
    #[error("Store request failed: {0}")]
    Backend(String),
    #[error("Malformed conversation record: {0}")]
    Malformed(String),
}

/// Runs the three-stage council for a user message
#[async_trait]
pub trait CouncilPipeline: Send + Sync {
    /// Start a run; stage results arrive on the returned stream
    async fn run_council(
        &self,
        conversation_id: &str,
        text: &str,
    ) -> Result<PipelineStream, PipelineError>;
}

/// Source of conversation listings and histories
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// List conversation summaries in display order
    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, StoreError>;

    /// Load one conversation with its full history
    async fn get_conversation(&self, id: &str) -> Result<Conversation, StoreError>;

    /// Create an empty conversation
    async fn create_conversation(&self) -> Result<ConversationSummary, StoreError>;
}

/// Combined backend trait for convenience
pub trait Backend: CouncilPipeline + ConversationStore {}
impl<T: CouncilPipeline + ConversationStore> Backend for T {}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: CouncilPipeline + ?Sized> CouncilPipeline for Arc<T> {
    async fn run_council(
        &self,
        conversation_id: &str,
        text: &str,
    ) -> Result<PipelineStream, PipelineError> {
        (**self).run_council(conversation_id, text).await
    }
}

#[async_trait]
impl<T: ConversationStore + ?Sized> ConversationStore for Arc<T> {
    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, StoreError> {
        (**self).list_conversations().await
    }

    async fn get_conversation(&self, id: &str) -> Result<Conversation, StoreError> {
        (**self).get_conversation(id).await
    }

    async fn create_conversation(&self) -> Result<ConversationSummary, StoreError> {
        (**self).create_conversation().await
    }
}
