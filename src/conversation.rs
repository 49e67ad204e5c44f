//! Conversation and message model
//!
//! A user turn is a `MessageRecord::User` followed by a
//! `MessageRecord::Assistant` whose three stage slots fill in over time.
//! Slots only move forward, and a stage can only start once the previous
//! one is resolved, so a record can never show stage N without stage N-1.

use crate::council::{RankingsResult, Stage, Stage1Payload, Stage2Metadata, Stage3Payload, StageUpdate};
use crate::state_machine::ConvState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Stage Slot
// ============================================================================

/// Lifecycle of one stage on an assistant record
#[derive(Debug, Clone, PartialEq)]
pub enum StageSlot<T> {
    /// Not requested yet
    Pending,
    /// Result outstanding
    Loading,
    /// Result arrived
    Resolved(T),
    /// The pipeline failed while this stage was outstanding
    Failed { message: String },
}

/// Payload-free view of a slot, for comparisons and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Pending,
    Loading,
    Resolved,
    Failed,
}

impl<T> Default for StageSlot<T> {
    fn default() -> Self {
        StageSlot::Pending
    }
}

impl<T> StageSlot<T> {
    #[must_use]
    pub fn status(&self) -> SlotStatus {
        match self {
            StageSlot::Pending => SlotStatus::Pending,
            StageSlot::Loading => SlotStatus::Loading,
            StageSlot::Resolved(_) => SlotStatus::Resolved,
            StageSlot::Failed { .. } => SlotStatus::Failed,
        }
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(self, StageSlot::Loading)
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(self, StageSlot::Resolved(_))
    }

    #[must_use]
    pub fn resolved(&self) -> Option<&T> {
        match self {
            StageSlot::Resolved(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn failure(&self) -> Option<&str> {
        match self {
            StageSlot::Failed { message } => Some(message),
            _ => None,
        }
    }
}

/// Errors raised when a slot is driven out of its lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TurnError {
    #[error("{stage} cannot start while {previous} is {status:?}")]
    PreviousUnresolved {
        stage: Stage,
        previous: Stage,
        status: SlotStatus,
    },
    #[error("{stage} is {status:?}, expected {expected:?}")]
    UnexpectedStatus {
        stage: Stage,
        status: SlotStatus,
        expected: SlotStatus,
    },
    #[error("message {0} is not an assistant turn")]
    NotAnAssistantTurn(usize),
}

// ============================================================================
// Assistant Turn
// ============================================================================

/// Loading flags derived from the slots, as consumed by the view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LoadingFlags {
    pub stage1: bool,
    pub stage2: bool,
    pub stage3: bool,
}

/// The council's answer to one user message
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AssistantTurn {
    pub stage1: StageSlot<Stage1Payload>,
    pub stage2: StageSlot<RankingsResult>,
    pub stage3: StageSlot<Stage3Payload>,
}

impl AssistantTurn {
    /// A fresh turn with stage 1 already outstanding
    #[must_use]
    pub fn started() -> Self {
        Self {
            stage1: StageSlot::Loading,
            ..Self::default()
        }
    }

    /// Rebuild a turn from stored stage results.
    ///
    /// Missing stages stay `Pending`; a stage present without its predecessor
    /// is rejected.
    ///
    /// # Errors
    ///
    /// `TurnError` for a stage stored without its predecessor.
    pub fn restore(
        stage1: Option<Stage1Payload>,
        stage2: Option<RankingsResult>,
        stage3: Option<Stage3Payload>,
    ) -> Result<Self, TurnError> {
        let mut turn = Self::default();
        if let Some(payload) = stage1 {
            turn.stage1 = StageSlot::Resolved(payload);
        }
        if let Some(result) = stage2 {
            turn.require_resolved(Stage::Rankings)?;
            turn.stage2 = StageSlot::Resolved(result);
        }
        if let Some(payload) = stage3 {
            turn.require_resolved(Stage::Synthesis)?;
            turn.stage3 = StageSlot::Resolved(payload);
        }
        Ok(turn)
    }

    #[must_use]
    pub fn status(&self, stage: Stage) -> SlotStatus {
        match stage {
            Stage::Responses => self.stage1.status(),
            Stage::Rankings => self.stage2.status(),
            Stage::Synthesis => self.stage3.status(),
        }
    }

    #[must_use]
    pub fn loading(&self) -> LoadingFlags {
        LoadingFlags {
            stage1: self.stage1.is_loading(),
            stage2: self.stage2.is_loading(),
            stage3: self.stage3.is_loading(),
        }
    }

    /// The stage currently outstanding, if any
    #[must_use]
    pub fn loading_stage(&self) -> Option<Stage> {
        Stage::ALL
            .into_iter()
            .find(|stage| self.status(*stage) == SlotStatus::Loading)
    }

    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.loading_stage().is_some()
    }

    #[must_use]
    pub fn metadata(&self) -> Option<&Stage2Metadata> {
        self.stage2.resolved().map(|r| &r.metadata)
    }

    /// Move a pending stage to loading
    ///
    /// # Errors
    ///
    /// `TurnError` when the stage is not pending or its predecessor is unresolved.
    pub fn begin(&mut self, stage: Stage) -> Result<(), TurnError> {
        self.require_resolved(stage)?;
        self.expect_status(stage, SlotStatus::Pending)?;
        match stage {
            Stage::Responses => self.stage1 = StageSlot::Loading,
            Stage::Rankings => self.stage2 = StageSlot::Loading,
            Stage::Synthesis => self.stage3 = StageSlot::Loading,
        }
        Ok(())
    }

    /// Store a stage result and start the next stage, as one step
    ///
    /// # Errors
    ///
    /// `TurnError` when the update is not for the stage currently loading.
    pub fn resolve(&mut self, update: StageUpdate) -> Result<(), TurnError> {
        let stage = update.stage();
        self.expect_status(stage, SlotStatus::Loading)?;
        match update {
            StageUpdate::Responses(payload) => self.stage1 = StageSlot::Resolved(payload),
            StageUpdate::Rankings(result) => self.stage2 = StageSlot::Resolved(result),
            StageUpdate::Synthesis(payload) => self.stage3 = StageSlot::Resolved(payload),
        }
        if let Some(next) = stage.next() {
            self.begin(next)?;
        }
        Ok(())
    }

    /// Mark the outstanding stage as failed; earlier results stay untouched
    ///
    /// # Errors
    ///
    /// `TurnError` when the stage is not the one currently loading.
    pub fn fail(&mut self, stage: Stage, message: impl Into<String>) -> Result<(), TurnError> {
        self.expect_status(stage, SlotStatus::Loading)?;
        let failed = message.into();
        match stage {
            Stage::Responses => self.stage1 = StageSlot::Failed { message: failed },
            Stage::Rankings => self.stage2 = StageSlot::Failed { message: failed },
            Stage::Synthesis => self.stage3 = StageSlot::Failed { message: failed },
        }
        Ok(())
    }

    fn require_resolved(&self, stage: Stage) -> Result<(), TurnError> {
        match stage.previous() {
            Some(previous) if self.status(previous) != SlotStatus::Resolved => {
                Err(TurnError::PreviousUnresolved {
                    stage,
                    previous,
                    status: self.status(previous),
                })
            }
            _ => Ok(()),
        }
    }

    fn expect_status(&self, stage: Stage, expected: SlotStatus) -> Result<(), TurnError> {
        let status = self.status(stage);
        if status == expected {
            Ok(())
        } else {
            Err(TurnError::UnexpectedStatus {
                stage,
                status,
                expected,
            })
        }
    }
}

// ============================================================================
// Message Record
// ============================================================================

/// One entry of a conversation
#[derive(Debug, Clone, PartialEq)]
pub enum MessageRecord {
    User { content: String },
    Assistant(AssistantTurn),
}

impl MessageRecord {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        MessageRecord::User {
            content: content.into(),
        }
    }

    #[must_use]
    pub fn is_user(&self) -> bool {
        matches!(self, MessageRecord::User { .. })
    }

    #[must_use]
    pub fn as_assistant(&self) -> Option<&AssistantTurn> {
        match self {
            MessageRecord::Assistant(turn) => Some(turn),
            MessageRecord::User { .. } => None,
        }
    }
}

// ============================================================================
// Conversation
// ============================================================================

/// Lightweight listing entry as returned by the conversation store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub message_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
enum MessageLog {
    /// Only the count is known; the history has not been fetched yet
    Unloaded { count: usize },
    Loaded(Vec<MessageRecord>),
}

/// A conversation: identity, title, message history and deliberation state
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    pub id: String,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub state: ConvState,
    /// Set when the conversation changed while another one was displayed
    pub unseen_activity: bool,
    log: MessageLog,
}

impl Conversation {
    /// A brand new conversation with an empty, loaded history
    #[must_use]
    pub fn new(id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self::with_messages(id, None, created_at, Vec::new())
    }

    /// A fully loaded conversation
    #[must_use]
    pub fn with_messages(
        id: impl Into<String>,
        title: Option<String>,
        created_at: DateTime<Utc>,
        messages: Vec<MessageRecord>,
    ) -> Self {
        Self {
            id: id.into(),
            title,
            created_at,
            state: ConvState::Idle,
            unseen_activity: false,
            log: MessageLog::Loaded(messages),
        }
    }

    /// A listing entry whose history is fetched later
    #[must_use]
    pub fn from_summary(summary: ConversationSummary) -> Self {
        Self {
            id: summary.id,
            title: summary.title,
            created_at: summary.created_at,
            state: ConvState::Idle,
            unseen_activity: false,
            log: MessageLog::Unloaded {
                count: summary.message_count,
            },
        }
    }

    #[must_use]
    pub fn is_hydrated(&self) -> bool {
        matches!(self.log, MessageLog::Loaded(_))
    }

    /// Replace an unloaded history with the fetched one. Loaded histories are kept.
    pub fn hydrate(&mut self, messages: Vec<MessageRecord>) -> bool {
        if self.is_hydrated() {
            return false;
        }
        self.log = MessageLog::Loaded(messages);
        true
    }

    /// Consume the conversation, keeping only its history
    #[must_use]
    pub fn into_messages(self) -> Vec<MessageRecord> {
        match self.log {
            MessageLog::Loaded(messages) => messages,
            MessageLog::Unloaded { .. } => Vec::new(),
        }
    }

    #[must_use]
    pub fn messages(&self) -> &[MessageRecord] {
        match &self.log {
            MessageLog::Loaded(messages) => messages,
            MessageLog::Unloaded { .. } => &[],
        }
    }

    /// Always the length of the history when it is loaded
    #[must_use]
    pub fn message_count(&self) -> usize {
        match &self.log {
            MessageLog::Loaded(messages) => messages.len(),
            MessageLog::Unloaded { count } => *count,
        }
    }

    /// Title with blank values treated as untitled
    #[must_use]
    pub fn display_title(&self) -> Option<&str> {
        self.title.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    #[must_use]
    pub fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            created_at: self.created_at,
            message_count: self.message_count(),
        }
    }

    /// Update listing fields from a fresher summary
    pub fn apply_summary(&mut self, summary: &ConversationSummary) {
        if summary.title.is_some() {
            self.title.clone_from(&summary.title);
        }
        if let MessageLog::Unloaded { count } = &mut self.log {
            *count = summary.message_count;
        }
    }

    pub fn push(&mut self, message: MessageRecord) {
        match &mut self.log {
            MessageLog::Loaded(messages) => messages.push(message),
            MessageLog::Unloaded { count } => {
                // Appending to an unfetched history starts a local one; the
                // store copy is picked up again on the next hydrate.
                tracing::warn!(
                    conv_id = %self.id,
                    stored = *count,
                    "Appending to a conversation whose history was never loaded"
                );
                self.log = MessageLog::Loaded(vec![message]);
            }
        }
    }

    /// # Errors
    ///
    /// `TurnError` when `index` is not an assistant record.
    pub fn turn_mut(&mut self, index: usize) -> Result<&mut AssistantTurn, TurnError> {
        match &mut self.log {
            MessageLog::Loaded(messages) => match messages.get_mut(index) {
                Some(MessageRecord::Assistant(turn)) => Ok(turn),
                _ => Err(TurnError::NotAnAssistantTurn(index)),
            },
            MessageLog::Unloaded { .. } => Err(TurnError::NotAnAssistantTurn(index)),
        }
    }

    #[must_use]
    pub fn last_turn(&self) -> Option<&AssistantTurn> {
        self.messages().last().and_then(MessageRecord::as_assistant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::council::{PeerRanking, Stage2Payload};

    fn stage1() -> Stage1Payload {
        Stage1Payload::from_pairs([("A", "4"), ("B", "four")]).unwrap()
    }

    fn stage2() -> StageUpdate {
        StageUpdate::rankings(
            Stage2Payload::new(vec![PeerRanking::new("A")]),
            Stage2Metadata::default(),
        )
    }

    #[test]
    fn test_started_turn_loads_stage1_only() {
        let turn = AssistantTurn::started();
        assert_eq!(
            turn.loading(),
            LoadingFlags {
                stage1: true,
                stage2: false,
                stage3: false
            }
        );
        assert_eq!(turn.loading_stage(), Some(Stage::Responses));
    }

    #[test]
    fn test_resolve_advances_loading() {
        let mut turn = AssistantTurn::started();
        turn.resolve(StageUpdate::Responses(stage1())).unwrap();
        assert!(turn.stage1.is_resolved());
        assert!(turn.stage2.is_loading());
        assert_eq!(turn.stage3.status(), SlotStatus::Pending);

        turn.resolve(stage2()).unwrap();
        turn.resolve(StageUpdate::Synthesis(Stage3Payload::new("The answer is 4.")))
            .unwrap();
        assert_eq!(turn.loading(), LoadingFlags::default());
        assert!(!turn.is_in_flight());
    }

    #[test]
    fn test_resolve_out_of_order_is_rejected() {
        let mut turn = AssistantTurn::started();
        let before = turn.clone();
        let err = turn.resolve(stage2()).unwrap_err();
        assert!(matches!(err, TurnError::UnexpectedStatus { stage: Stage::Rankings, .. }));
        assert_eq!(turn, before);
    }

    #[test]
    fn test_resolve_twice_is_rejected() {
        let mut turn = AssistantTurn::started();
        turn.resolve(StageUpdate::Responses(stage1())).unwrap();
        assert!(turn.resolve(StageUpdate::Responses(stage1())).is_err());
    }

    #[test]
    fn test_fail_keeps_earlier_stages() {
        let mut turn = AssistantTurn::started();
        turn.resolve(StageUpdate::Responses(stage1())).unwrap();
        turn.fail(Stage::Rankings, "rate limited").unwrap();

        assert!(turn.stage1.is_resolved());
        assert_eq!(turn.stage2.failure(), Some("rate limited"));
        assert_eq!(turn.stage3.status(), SlotStatus::Pending);
        assert!(!turn.is_in_flight());
    }

    #[test]
    fn test_restore_rejects_gaps() {
        let result = AssistantTurn::restore(None, None, Some(Stage3Payload::new("x")));
        assert!(matches!(
            result,
            Err(TurnError::PreviousUnresolved { stage: Stage::Synthesis, .. })
        ));

        let turn = AssistantTurn::restore(Some(stage1()), None, None).unwrap();
        assert!(turn.stage1.is_resolved());
        assert_eq!(turn.stage2.status(), SlotStatus::Pending);
    }

    #[test]
    fn test_message_count_tracks_history() {
        let mut conv = Conversation::new("conv-1", Utc::now());
        assert_eq!(conv.message_count(), 0);
        conv.push(MessageRecord::user("hi"));
        conv.push(MessageRecord::Assistant(AssistantTurn::started()));
        assert_eq!(conv.message_count(), conv.messages().len());
        assert_eq!(conv.summary().message_count, 2);
    }

    #[test]
    fn test_hydrate_only_once() {
        let summary = ConversationSummary {
            id: "conv-1".into(),
            title: None,
            created_at: Utc::now(),
            message_count: 2,
        };
        let mut conv = Conversation::from_summary(summary);
        assert!(!conv.is_hydrated());
        assert_eq!(conv.message_count(), 2);

        assert!(conv.hydrate(vec![MessageRecord::user("hi")]));
        assert_eq!(conv.message_count(), 1);
        assert!(!conv.hydrate(Vec::new()));
        assert_eq!(conv.message_count(), 1);
    }

    #[test]
    fn test_display_title_treats_blank_as_untitled() {
        let mut conv = Conversation::new("conv-1", Utc::now());
        assert_eq!(conv.display_title(), None);
        conv.title = Some("   ".into());
        assert_eq!(conv.display_title(), None);
        conv.title = Some("Arithmetic".into());
        assert_eq!(conv.display_title(), Some("Arithmetic"));
    }
}
