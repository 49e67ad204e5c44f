//! Mock implementations for testing
//!
//! These mocks drive the controllers without a council backend.

use super::traits::*;
use crate::conversation::{Conversation, ConversationSummary, MessageRecord};
use crate::council::{PipelineError, PipelineEvent};
use async_trait::async_trait;
use chrono::Utc;
use futures::stream;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;

type PipelineItem = Result<PipelineEvent, PipelineError>;

enum Script {
    /// Deliver all items, then end the stream
    Items(Vec<PipelineItem>),
    /// Deliver whatever the test sends, end when the sender is dropped
    Channel(mpsc::UnboundedReceiver<PipelineItem>),
    /// Fail before any stream exists
    Reject(PipelineError),
}

// ============================================================================
// Scripted Pipeline
// ============================================================================

/// Council pipeline that replays queued scripts, one per run
#[derive(Default)]
pub struct ScriptedPipeline {
    scripts: Mutex<VecDeque<Script>>,
    /// Record of all (conversation id, text) requests made
    pub requests: Mutex<Vec<(String, String)>>,
}

impl ScriptedPipeline {
    /// Queue a run that emits the given events and then ends
    pub fn queue_events(&self, events: Vec<PipelineEvent>) {
        self.queue_items(events.into_iter().map(Ok).collect());
    }

    pub fn queue_items(&self, items: Vec<PipelineItem>) {
        self.scripts.lock().unwrap().push_back(Script::Items(items));
    }

    /// Queue a run whose events are pushed by the test
    pub fn queue_channel(&self) -> mpsc::UnboundedSender<PipelineItem> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.scripts.lock().unwrap().push_back(Script::Channel(rx));
        tx
    }

    /// Queue a run that cannot be started
    pub fn queue_rejection(&self, error: PipelineError) {
        self.scripts.lock().unwrap().push_back(Script::Reject(error));
    }

    pub fn recorded_requests(&self) -> Vec<(String, String)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CouncilPipeline for ScriptedPipeline {
    async fn run_council(
        &self,
        conversation_id: &str,
        text: &str,
    ) -> Result<PipelineStream, PipelineError> {
        self.requests
            .lock()
            .unwrap()
            .push((conversation_id.to_string(), text.to_string()));

        let script = self.scripts.lock().unwrap().pop_front();
        match script {
            Some(Script::Items(items)) => Ok(Box::pin(stream::iter(items))),
            Some(Script::Channel(rx)) => Ok(Box::pin(stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            }))),
            Some(Script::Reject(error)) => Err(error),
            None => Err(PipelineError::network("No scripted council run queued")),
        }
    }
}

// ============================================================================
// In-Memory Store
// ============================================================================

/// Conversation store backed by a vector, newest first
#[derive(Default)]
pub struct InMemoryStore {
    conversations: Mutex<Vec<Conversation>>,
    fail_next: Mutex<Option<String>>,
    get_calls: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stored conversation after the existing ones
    pub fn seed(&self, id: &str, title: Option<&str>, messages: Vec<MessageRecord>) {
        self.conversations.lock().unwrap().push(Conversation::with_messages(
            id,
            title.map(String::from),
            Utc::now(),
            messages,
        ));
    }

    /// Make the next request fail with a backend error
    pub fn fail_next(&self, message: &str) {
        *self.fail_next.lock().unwrap() = Some(message.to_string());
    }

    /// Number of history fetches served
    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    fn check_failure(&self) -> Result<(), StoreError> {
        match self.fail_next.lock().unwrap().take() {
            Some(message) => Err(StoreError::Backend(message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, StoreError> {
        self.check_failure()?;
        Ok(self
            .conversations
            .lock()
            .unwrap()
            .iter()
            .map(Conversation::summary)
            .collect())
    }

    async fn get_conversation(&self, id: &str) -> Result<Conversation, StoreError> {
        self.check_failure()?;
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.conversations
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn create_conversation(&self) -> Result<ConversationSummary, StoreError> {
        self.check_failure()?;
        let conv = Conversation::new(uuid::Uuid::new_v4().to_string(), Utc::now());
        let summary = conv.summary();
        self.conversations.lock().unwrap().insert(0, conv);
        Ok(summary)
    }
}

// ============================================================================
// Combined Backend
// ============================================================================

/// Pipeline and store bundled for the conversation controller
#[derive(Default)]
pub struct MockBackend {
    pub pipeline: ScriptedPipeline,
    pub store: InMemoryStore,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CouncilPipeline for MockBackend {
    async fn run_council(
        &self,
        conversation_id: &str,
        text: &str,
    ) -> Result<PipelineStream, PipelineError> {
        self.pipeline.run_council(conversation_id, text).await
    }
}

#[async_trait]
impl ConversationStore for MockBackend {
    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, StoreError> {
        self.store.list_conversations().await
    }

    async fn get_conversation(&self, id: &str) -> Result<Conversation, StoreError> {
        self.store.get_conversation(id).await
    }

    async fn create_conversation(&self) -> Result<ConversationSummary, StoreError> {
        self.store.create_conversation().await
    }
}
