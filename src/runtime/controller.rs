//! Conversation controller
//!
//! Submits user messages and folds the council's stage events into the
//! workspace. Every event goes through the pure transition function under
//! the workspace lock; the council stream itself is consumed by a spawned
//! task per run.

use super::list::ConversationListController;
use super::traits::Backend;
use super::{ControllerError, SharedWorkspace, UiEvent};
use crate::state_machine::{transition, ConvContext, Effect, Event, Notice, TransitionError};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

pub struct ConversationController<B: Backend + 'static> {
    list: ConversationListController<B>,
    backend: Arc<B>,
    shutdown: CancellationToken,
    tasks: TaskTracker,
}

impl<B: Backend + 'static> Clone for ConversationController<B> {
    fn clone(&self) -> Self {
        Self {
            list: self.list.clone(),
            backend: self.backend.clone(),
            shutdown: self.shutdown.clone(),
            tasks: self.tasks.clone(),
        }
    }
}

/// What a transition changed, collected while the lock is held
#[derive(Default)]
struct Applied {
    deferred: Vec<Effect>,
    notices: Vec<Notice>,
    list_changed: bool,
    follow: bool,
}

impl<B: Backend + 'static> ConversationController<B> {
    #[must_use]
    pub fn new(
        workspace: SharedWorkspace,
        backend: Arc<B>,
        events: broadcast::Sender<UiEvent>,
    ) -> Self {
        Self {
            list: ConversationListController::new(workspace, backend.clone(), events),
            backend,
            shutdown: CancellationToken::new(),
            tasks: TaskTracker::new(),
        }
    }

    #[must_use]
    pub fn list(&self) -> &ConversationListController<B> {
        &self.list
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.list.subscribe()
    }

    /// Submit a user message.
    ///
    /// With no conversation id a new conversation is created and selected
    /// first. Returns the id the message went to.
    ///
    /// # Errors
    ///
    /// `EmptyInput` for blank text, `SubmissionInFlight` while a run is
    /// outstanding, `NotFound` for an unknown id, `Store` when creating or
    /// loading the conversation fails.
    pub async fn submit(
        &self,
        conversation_id: Option<&str>,
        text: &str,
    ) -> Result<String, ControllerError> {
        let text = text.trim();
        if text.is_empty() {
            tracing::debug!("Ignoring blank submission");
            return Err(ControllerError::EmptyInput);
        }

        let id = match conversation_id {
            Some(id) => {
                {
                    let ws = self.list.workspace().read().await;
                    let conv = ws
                        .get(id)
                        .ok_or_else(|| ControllerError::NotFound(id.to_string()))?;
                    if conv.state.is_working() {
                        tracing::debug!(conv_id = %id, "Ignoring submission while deliberating");
                        return Err(ControllerError::SubmissionInFlight(id.to_string()));
                    }
                }
                self.list.ensure_hydrated(id).await?;
                id.to_string()
            }
            None => self.list.create_new().await?,
        };

        let deferred = match self
            .apply(
                &id,
                Event::UserMessage {
                    text: text.to_string(),
                },
            )
            .await
        {
            Ok(deferred) => deferred,
            Err(ControllerError::Transition(TransitionError::SubmissionInFlight)) => {
                return Err(ControllerError::SubmissionInFlight(id));
            }
            Err(ControllerError::Transition(TransitionError::EmptyInput)) => {
                return Err(ControllerError::EmptyInput);
            }
            Err(e) => return Err(e),
        };

        for effect in deferred {
            if let Effect::RequestCouncil { text } = effect {
                tracing::info!(conv_id = %id, "Requesting council");
                let controller = self.clone();
                let conv_id = id.clone();
                self.tasks
                    .spawn(async move { controller.drive(conv_id, text).await });
            }
        }

        Ok(id)
    }

    /// Stop consuming council streams and wait for the runs to wind down
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.tasks.close();
        self.tasks.wait().await;
        tracing::info!("Conversation controller stopped");
    }

    /// Consume one council run and feed its events to the conversation
    async fn drive(self, conversation_id: String, text: String) {
        let started = tokio::select! {
            biased;
            () = self.shutdown.cancelled() => return,
            started = self.backend.run_council(&conversation_id, &text) => started,
        };

        let mut stream = match started {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(conv_id = %conversation_id, error = %e, "Council request failed");
                self.deliver(
                    &conversation_id,
                    Event::StageFailed {
                        message: e.to_string(),
                    },
                )
                .await;
                return;
            }
        };

        loop {
            let item = tokio::select! {
                biased;
                () = self.shutdown.cancelled() => {
                    tracing::info!(conv_id = %conversation_id, "Council stream abandoned on shutdown");
                    return;
                }
                item = stream.next() => item,
            };

            match item {
                Some(Ok(event)) => self.deliver(&conversation_id, event.into()).await,
                Some(Err(e)) => {
                    tracing::warn!(conv_id = %conversation_id, error = %e, "Council stream failed");
                    self.deliver(
                        &conversation_id,
                        Event::StageFailed {
                            message: e.to_string(),
                        },
                    )
                    .await;
                    return;
                }
                None => {
                    self.deliver(&conversation_id, Event::PipelineFinished).await;
                    return;
                }
            }
        }
    }

    /// Apply a pipeline event; rejected events are logged and dropped
    async fn deliver(&self, conversation_id: &str, event: Event) {
        match self.apply(conversation_id, event).await {
            Ok(_) => {}
            Err(ControllerError::Transition(e)) => {
                tracing::warn!(conv_id = %conversation_id, error = %e, "Ignoring pipeline event");
            }
            Err(e) => {
                tracing::error!(conv_id = %conversation_id, error = %e, "Failed to apply pipeline event");
                self.list.notify(UiEvent::Diagnostic {
                    message: e.to_string(),
                });
            }
        }
    }

    /// Run one transition and apply its effects. Returns the effects that
    /// must run outside the lock.
    async fn apply(&self, conversation_id: &str, event: Event) -> Result<Vec<Effect>, ControllerError> {
        let applied = {
            let mut ws = self.list.workspace().write().await;
            let follow = ws.is_current(conversation_id);
            let conv = ws
                .get_mut(conversation_id)
                .ok_or_else(|| ControllerError::NotFound(conversation_id.to_string()))?;

            let context = ConvContext::new(conv.id.clone(), conv.message_count());
            let result =
                transition(&conv.state, &context, event).map_err(ControllerError::Transition)?;

            let previous = std::mem::replace(&mut conv.state, result.new_state);
            tracing::debug!(
                conv_id = %conversation_id,
                from = ?previous,
                to = ?conv.state,
                "State transition"
            );

            let mut applied = Applied {
                follow,
                ..Applied::default()
            };
            for effect in result.effects {
                let outcome = match effect {
                    Effect::AppendMessage(message) => {
                        conv.push(message);
                        applied.list_changed = true;
                        Ok(())
                    }
                    Effect::ResolveStage { turn, update } => {
                        let stage = update.stage();
                        tracing::info!(conv_id = %conversation_id, %stage, "Stage resolved");
                        conv.turn_mut(turn).and_then(|t| t.resolve(update))
                    }
                    Effect::FailStage {
                        turn,
                        stage,
                        message,
                    } => {
                        tracing::warn!(conv_id = %conversation_id, %stage, error = %message, "Stage failed");
                        conv.turn_mut(turn).and_then(|t| t.fail(stage, message))
                    }
                    Effect::SetTitle { title } => {
                        conv.title = Some(title);
                        Ok(())
                    }
                    Effect::NotifyClient(notice) => {
                        applied.notices.push(notice);
                        Ok(())
                    }
                    Effect::RequestCouncil { .. } => {
                        applied.deferred.push(effect);
                        Ok(())
                    }
                };

                if let Err(e) = outcome {
                    // Records only move through the transitions above; a
                    // rejection means the record and state disagree
                    conv.state = previous;
                    return Err(e.into());
                }
            }

            if !follow && !applied.notices.is_empty() && !conv.unseen_activity {
                conv.unseen_activity = true;
                applied.list_changed = true;
            }
            applied
        };

        self.publish(conversation_id, &applied);
        Ok(applied.deferred)
    }

    fn publish(&self, conversation_id: &str, applied: &Applied) {
        let mut list_changed = applied.list_changed;
        let mut updated = false;

        for notice in &applied.notices {
            match notice {
                Notice::Updated => updated = true,
                Notice::TitleChanged => list_changed = true,
                Notice::StageFailed { stage, message } => {
                    updated = true;
                    self.list.notify(UiEvent::StageFailed {
                        conversation_id: conversation_id.to_string(),
                        stage: *stage,
                        message: message.clone(),
                    });
                }
                Notice::CouncilDone => self.list.notify(UiEvent::CouncilDone {
                    conversation_id: conversation_id.to_string(),
                }),
            }
        }

        if list_changed {
            self.list.notify(UiEvent::ListChanged);
        }
        if updated {
            self.list.notify(UiEvent::ConversationUpdated {
                conversation_id: conversation_id.to_string(),
                follow: applied.follow,
            });
        }
    }
}
