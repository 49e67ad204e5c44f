//! Events that can occur in a conversation

use crate::council::{PipelineEvent, Stage, StageUpdate};

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    // User events
    UserMessage {
        text: String,
    },

    // Pipeline events
    StageStarted {
        stage: Stage,
    },
    StageCompleted(StageUpdate),
    StageFailed {
        message: String,
    },
    TitleGenerated {
        title: String,
    },
    /// The pipeline stream ended, normally or not
    PipelineFinished,
}

impl From<PipelineEvent> for Event {
    fn from(event: PipelineEvent) -> Self {
        match event {
            PipelineEvent::StageStarted(stage) => Event::StageStarted { stage },
            PipelineEvent::StageCompleted(update) => Event::StageCompleted(update),
            PipelineEvent::TitleGenerated(title) => Event::TitleGenerated { title },
            PipelineEvent::Failed { message } => Event::StageFailed { message },
            PipelineEvent::Complete => Event::PipelineFinished,
        }
    }
}
