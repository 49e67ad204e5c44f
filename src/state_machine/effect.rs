//! Effects produced by state transitions

use crate::conversation::{AssistantTurn, MessageRecord};
use crate::council::{Stage, StageUpdate};

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Append a record to the conversation
    AppendMessage(MessageRecord),

    /// Store a stage result on the assistant record at `turn`
    ResolveStage { turn: usize, update: StageUpdate },

    /// Attach a failure marker to the outstanding stage at `turn`
    FailStage {
        turn: usize,
        stage: Stage,
        message: String,
    },

    /// Replace the conversation title
    SetTitle { title: String },

    /// Start a council run for the given text
    RequestCouncil { text: String },

    /// Notify the presentation layer
    NotifyClient(Notice),
}

/// What the presentation layer is told after a transition
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// Messages of the conversation changed
    Updated,
    /// Title changed, the list needs a redraw
    TitleChanged,
    /// A stage failed
    StageFailed { stage: Stage, message: String },
    /// The council produced its final answer
    CouncilDone,
}

impl Effect {
    #[must_use]
    pub fn append_user_message(text: impl Into<String>) -> Self {
        Effect::AppendMessage(MessageRecord::user(text))
    }

    #[must_use]
    pub fn append_assistant_turn() -> Self {
        Effect::AppendMessage(MessageRecord::Assistant(AssistantTurn::started()))
    }

    #[must_use]
    pub fn notify_updated() -> Self {
        Effect::NotifyClient(Notice::Updated)
    }

    #[must_use]
    pub fn notify_council_done() -> Self {
        Effect::NotifyClient(Notice::CouncilDone)
    }

    #[must_use]
    pub fn notify_failure(stage: Stage, message: impl Into<String>) -> Self {
        Effect::NotifyClient(Notice::StageFailed {
            stage,
            message: message.into(),
        })
    }
}
