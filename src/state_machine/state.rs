//! Conversation state types

use crate::council::Stage;
use serde::{Deserialize, Serialize};

/// Deliberation state of one conversation
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConvState {
    /// Ready for user input, no council run outstanding
    #[default]
    Idle,

    /// A council run is in flight for the assistant record at `turn`
    Deliberating {
        /// Index of the assistant record being filled in
        turn: usize,
        /// The stage whose result is awaited next
        stage: Stage,
    },

    /// The last run failed; the failure is shown on the record and the
    /// conversation accepts new input
    Error { stage: Stage, message: String },
}

impl ConvState {
    /// Check if a council run is outstanding
    #[must_use]
    pub fn is_working(&self) -> bool {
        matches!(self, ConvState::Deliberating { .. })
    }

    /// Stage currently awaited, if any
    #[must_use]
    pub fn awaited_stage(&self) -> Option<Stage> {
        match self {
            ConvState::Deliberating { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Context for a transition (read-only facts about the conversation)
#[derive(Debug, Clone)]
pub struct ConvContext {
    pub conversation_id: String,
    /// Number of records before the event is applied
    pub message_count: usize,
}

impl ConvContext {
    #[must_use]
    pub fn new(conversation_id: impl Into<String>, message_count: usize) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            message_count,
        }
    }
}
