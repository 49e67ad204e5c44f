//! Pure state transition function
//!
//! Given the same state, context and event this always produces the same
//! result, with no I/O. Stage ordering lives here: a deliberating
//! conversation accepts only the stage it is waiting for.

use super::{ConvContext, ConvState, Effect, Event};
use crate::council::Stage;
use crate::state_machine::effect::Notice;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ConvState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    #[must_use]
    pub fn new(state: ConvState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    #[must_use]
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    #[must_use]
    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Message is empty")]
    EmptyInput,
    #[error("Council is still deliberating, wait for the final answer")]
    SubmissionInFlight,
    #[error("Expected {expected} but the pipeline delivered {got}")]
    OutOfOrder { expected: Stage, got: Stage },
    #[error("No council run in flight")]
    NoSubmissionInFlight,
}

/// Pure transition function
///
/// # Errors
///
/// `TransitionError` for input the current state does not accept.
pub fn transition(
    state: &ConvState,
    context: &ConvContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // User Message Handling
        // ============================================================

        (_, Event::UserMessage { text }) if text.trim().is_empty() => {
            Err(TransitionError::EmptyInput)
        }

        // Idle/Error + UserMessage -> Deliberating on stage 1
        (ConvState::Idle | ConvState::Error { .. }, Event::UserMessage { text }) => {
            let text = text.trim().to_string();
            // The user record lands at message_count, the assistant record right after
            let turn = context.message_count + 1;
            Ok(TransitionResult::new(ConvState::Deliberating {
                turn,
                stage: Stage::Responses,
            })
            .with_effect(Effect::append_user_message(text.clone()))
            .with_effect(Effect::append_assistant_turn())
            .with_effect(Effect::notify_updated())
            .with_effect(Effect::RequestCouncil { text }))
        }

        (ConvState::Deliberating { .. }, Event::UserMessage { .. }) => {
            Err(TransitionError::SubmissionInFlight)
        }

        // ============================================================
        // Stage Progress
        // ============================================================

        // The pipeline announcing the stage we already show as loading
        (ConvState::Deliberating { stage, .. }, Event::StageStarted { stage: started })
            if *stage == started =>
        {
            Ok(TransitionResult::new(state.clone()))
        }

        (ConvState::Deliberating { stage, .. }, Event::StageStarted { stage: started }) => {
            Err(TransitionError::OutOfOrder {
                expected: *stage,
                got: started,
            })
        }

        // Deliberating + StageCompleted (matching stage) -> next stage or Idle
        (ConvState::Deliberating { turn, stage }, Event::StageCompleted(update))
            if update.stage() == *stage =>
        {
            let turn = *turn;
            let result = match stage.next() {
                Some(next) => TransitionResult::new(ConvState::Deliberating { turn, stage: next })
                    .with_effect(Effect::ResolveStage { turn, update })
                    .with_effect(Effect::notify_updated()),
                None => TransitionResult::new(ConvState::Idle)
                    .with_effect(Effect::ResolveStage { turn, update })
                    .with_effect(Effect::notify_updated())
                    .with_effect(Effect::notify_council_done()),
            };
            Ok(result)
        }

        (ConvState::Deliberating { stage, .. }, Event::StageCompleted(update)) => {
            Err(TransitionError::OutOfOrder {
                expected: *stage,
                got: update.stage(),
            })
        }

        // ============================================================
        // Failure
        // ============================================================

        (ConvState::Deliberating { turn, stage }, Event::StageFailed { message }) => {
            Ok(fail_stage(*turn, *stage, message))
        }

        // Stream ended before the final answer: never leave a stage loading
        (ConvState::Deliberating { turn, stage }, Event::PipelineFinished) => Ok(fail_stage(
            *turn,
            *stage,
            format!("Council pipeline closed before stage {} completed", stage.number()),
        )),

        (ConvState::Idle | ConvState::Error { .. }, Event::PipelineFinished) => {
            Ok(TransitionResult::new(state.clone()))
        }

        // ============================================================
        // Title
        // ============================================================

        (_, Event::TitleGenerated { title }) => {
            let title = title.trim();
            if title.is_empty() {
                return Ok(TransitionResult::new(state.clone()));
            }
            Ok(TransitionResult::new(state.clone())
                .with_effect(Effect::SetTitle {
                    title: title.to_string(),
                })
                .with_effect(Effect::NotifyClient(Notice::TitleChanged)))
        }

        // ============================================================
        // Invalid Transitions
        // ============================================================

        (
            ConvState::Idle | ConvState::Error { .. },
            Event::StageStarted { .. } | Event::StageCompleted(_) | Event::StageFailed { .. },
        ) => Err(TransitionError::NoSubmissionInFlight),
    }
}

fn fail_stage(turn: usize, stage: Stage, message: String) -> TransitionResult {
    TransitionResult::new(ConvState::Error {
        stage,
        message: message.clone(),
    })
    .with_effects([
        Effect::FailStage {
            turn,
            stage,
            message: message.clone(),
        },
        Effect::notify_failure(stage, message),
    ])
}
