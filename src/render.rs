//! Rendering boundary
//!
//! Pure projections from the workspace to display structures. Nothing here
//! mutates state; the front-end redraws by projecting again after every
//! change notification.

mod stage1;
mod stage2;
mod stage3;

pub use stage1::{project_stage1, ResponseCard, Stage1View};
pub use stage2::{
    deanonymize, project_stage2, AggregateRow, EvaluationView, RankedEntry, Stage2View,
};
pub use stage3::{project_stage3, Stage3View};

use crate::conversation::{AssistantTurn, Conversation, LoadingFlags, MessageRecord, StageSlot};
use crate::council::Stage;
use crate::runtime::Workspace;
use serde::Serialize;

/// Shown for conversations that have no title yet
pub const UNTITLED: &str = "New Conversation";

/// Conversation-level caption while a council run is outstanding
pub const CONSULTING_CAPTION: &str = "Consulting the council...";

/// Short display name for a model identifier: the part after the last `/`
#[must_use]
pub fn short_model_name(model: &str) -> &str {
    model.rsplit('/').next().unwrap_or(model)
}

// ============================================================================
// Rich Text
// ============================================================================

/// Markdown content; the front-end turns it into styled text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RichText {
    pub markdown: String,
}

impl RichText {
    #[must_use]
    pub fn from_markdown(markdown: impl Into<String>) -> Self {
        Self {
            markdown: markdown.into(),
        }
    }
}

// ============================================================================
// Stage View
// ============================================================================

/// What the view shows for one stage of an assistant message
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StageView<T> {
    /// Nothing requested yet
    Hidden,
    Loading { caption: &'static str },
    Ready { content: T },
    Failed { message: String },
}

impl<T> StageView<T> {
    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(self, StageView::Loading { .. })
    }

    #[must_use]
    pub fn content(&self) -> Option<&T> {
        match self {
            StageView::Ready { content } => Some(content),
            _ => None,
        }
    }
}

fn project_slot<T, V>(slot: &StageSlot<T>, stage: Stage, project: impl FnOnce(&T) -> V) -> StageView<V> {
    match slot {
        StageSlot::Pending => StageView::Hidden,
        StageSlot::Loading => StageView::Loading {
            caption: stage.loading_caption(),
        },
        StageSlot::Resolved(payload) => StageView::Ready {
            content: project(payload),
        },
        StageSlot::Failed { message } => StageView::Failed {
            message: message.clone(),
        },
    }
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssistantView {
    pub stage1: StageView<Stage1View>,
    pub stage2: StageView<Stage2View>,
    pub stage3: StageView<Stage3View>,
    pub loading: LoadingFlags,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum MessageView {
    User { content: RichText },
    Assistant(AssistantView),
}

#[must_use]
pub fn project_turn(turn: &AssistantTurn) -> AssistantView {
    AssistantView {
        stage1: project_slot(&turn.stage1, Stage::Responses, project_stage1),
        stage2: project_slot(&turn.stage2, Stage::Rankings, project_stage2),
        stage3: project_slot(&turn.stage3, Stage::Synthesis, project_stage3),
        loading: turn.loading(),
    }
}

#[must_use]
pub fn project_message(message: &MessageRecord) -> MessageView {
    match message {
        MessageRecord::User { content } => MessageView::User {
            content: RichText::from_markdown(content.as_str()),
        },
        MessageRecord::Assistant(turn) => MessageView::Assistant(project_turn(turn)),
    }
}

// ============================================================================
// Conversation
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationView {
    pub id: String,
    pub title: String,
    pub messages: Vec<MessageView>,
    pub in_flight: bool,
    /// `CONSULTING_CAPTION` while deliberating
    pub caption: Option<&'static str>,
    /// No messages yet: the view shows its start state
    pub is_empty: bool,
}

#[must_use]
pub fn project_conversation(conversation: &Conversation) -> ConversationView {
    let in_flight = conversation.state.is_working();
    ConversationView {
        id: conversation.id.clone(),
        title: conversation.display_title().unwrap_or(UNTITLED).to_string(),
        messages: conversation.messages().iter().map(project_message).collect(),
        in_flight,
        caption: in_flight.then_some(CONSULTING_CAPTION),
        is_empty: conversation.message_count() == 0,
    }
}

// ============================================================================
// Conversation List
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationListItem {
    pub id: String,
    pub title: String,
    pub message_count: usize,
    pub is_current: bool,
    pub unseen_activity: bool,
    pub in_flight: bool,
}

impl ConversationListItem {
    /// Secondary line under the title
    #[must_use]
    pub fn meta(&self) -> String {
        format!("{} messages", self.message_count)
    }
}

/// Project the workspace to list entries, in workspace order
#[must_use]
pub fn project_list(workspace: &Workspace) -> Vec<ConversationListItem> {
    workspace
        .conversations()
        .iter()
        .map(|conv| ConversationListItem {
            id: conv.id.clone(),
            title: conv.display_title().unwrap_or(UNTITLED).to_string(),
            message_count: conv.message_count(),
            is_current: workspace.is_current(&conv.id),
            unseen_activity: conv.unseen_activity,
            in_flight: conv.state.is_working(),
        })
        .collect()
}
