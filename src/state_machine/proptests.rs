//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across all possible inputs,
//! including pipelines that deliver stages out of order or twice.

use super::transition::*;
use super::*;
use crate::conversation::{AssistantTurn, Conversation, MessageRecord, SlotStatus};
use crate::council::{
    AggregateRanking, PeerRanking, Stage, Stage1Payload, Stage2Metadata, Stage2Payload,
    Stage3Payload, StageUpdate,
};
use chrono::Utc;
use proptest::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

fn test_context(conv: &Conversation) -> ConvContext {
    ConvContext::new(conv.id.clone(), conv.message_count())
}

/// Apply effects the way the controller does, failing on any data-layer rejection
fn apply_effects(conv: &mut Conversation, effects: Vec<Effect>) -> Result<(), String> {
    for effect in effects {
        match effect {
            Effect::AppendMessage(message) => conv.push(message),
            Effect::ResolveStage { turn, update } => conv
                .turn_mut(turn)
                .and_then(|t| t.resolve(update))
                .map_err(|e| e.to_string())?,
            Effect::FailStage {
                turn,
                stage,
                message,
            } => conv
                .turn_mut(turn)
                .and_then(|t| t.fail(stage, message))
                .map_err(|e| e.to_string())?,
            Effect::SetTitle { title } => conv.title = Some(title),
            Effect::RequestCouncil { .. } | Effect::NotifyClient(_) => {}
        }
    }
    Ok(())
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_stage() -> impl Strategy<Value = Stage> {
    prop_oneof![
        Just(Stage::Responses),
        Just(Stage::Rankings),
        Just(Stage::Synthesis),
    ]
}

fn arb_stage1() -> impl Strategy<Value = StageUpdate> {
    proptest::collection::btree_map("[A-E]", "[a-z0-9 ]{1,12}", 0..4).prop_map(|map| {
        StageUpdate::Responses(Stage1Payload::from_pairs(map).expect("btree keys are unique"))
    })
}

fn arb_stage2() -> impl Strategy<Value = StageUpdate> {
    (
        proptest::collection::vec("[A-E]", 0..4),
        proptest::collection::btree_map("[A-E]", "[a-z]{2,8}/[a-z0-9-]{2,8}", 0..4),
        proptest::collection::vec((1u32..5, 0u32..5), 0..4),
    )
        .prop_map(|(labels, label_to_model, aggregates)| {
            let rankings = labels.into_iter().map(PeerRanking::new).collect();
            let aggregate_rankings = aggregates
                .into_iter()
                .enumerate()
                .map(|(i, (rank, count))| AggregateRanking {
                    model: format!("model-{i}"),
                    average_rank: f64::from(rank),
                    rankings_count: count,
                })
                .collect();
            StageUpdate::rankings(
                Stage2Payload::new(rankings),
                Stage2Metadata {
                    label_to_model,
                    aggregate_rankings,
                },
            )
        })
}

fn arb_stage3() -> impl Strategy<Value = StageUpdate> {
    "[a-zA-Z0-9 .]{1,30}".prop_map(|text| StageUpdate::Synthesis(Stage3Payload::new(text)))
}

fn arb_user_message_event() -> impl Strategy<Value = Event> {
    "[a-zA-Z ?]{0,20}".prop_map(|text| Event::UserMessage { text })
}

fn arb_pipeline_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        arb_stage().prop_map(|stage| Event::StageStarted { stage }),
        arb_stage1().prop_map(Event::StageCompleted),
        arb_stage2().prop_map(Event::StageCompleted),
        arb_stage3().prop_map(Event::StageCompleted),
        "[a-z ]{1,20}".prop_map(|message| Event::StageFailed { message }),
        "[A-Za-z ]{0,20}".prop_map(|title| Event::TitleGenerated { title }),
        Just(Event::PipelineFinished),
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        1 => arb_user_message_event(),
        4 => arb_pipeline_event(),
    ]
}

fn arb_deliberating_state() -> impl Strategy<Value = ConvState> {
    (1usize..20, arb_stage()).prop_map(|(turn, stage)| ConvState::Deliberating { turn, stage })
}

// ============================================================================
// State Validity Checkers
// ============================================================================

/// Every assistant record satisfies the slot ordering invariant
fn records_are_ordered(conv: &Conversation) -> bool {
    conv.messages()
        .iter()
        .filter_map(MessageRecord::as_assistant)
        .all(|turn| {
            Stage::ALL.into_iter().all(|stage| match stage.previous() {
                Some(previous) if turn.status(stage) != SlotStatus::Pending => {
                    turn.status(previous) == SlotStatus::Resolved
                }
                _ => true,
            })
        })
}

/// Loading and resolved content are never shown together for a stage
fn flags_are_exclusive(conv: &Conversation) -> bool {
    conv.messages()
        .iter()
        .filter_map(MessageRecord::as_assistant)
        .all(|turn| {
            let flags = turn.loading();
            !(flags.stage1 && turn.stage1.is_resolved())
                && !(flags.stage2 && turn.stage2.is_resolved())
                && !(flags.stage3 && turn.stage3.is_resolved())
        })
}

/// The state machine and the record agree on what is outstanding
fn state_matches_records(conv: &Conversation) -> bool {
    let outstanding: Vec<(usize, Stage)> = conv
        .messages()
        .iter()
        .enumerate()
        .filter_map(|(i, m)| m.as_assistant().and_then(AssistantTurn::loading_stage).map(|s| (i, s)))
        .collect();
    match &conv.state {
        ConvState::Deliberating { turn, stage } => outstanding == vec![(*turn, *stage)],
        ConvState::Idle | ConvState::Error { .. } => outstanding.is_empty(),
    }
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Invariant 1: Records stay consistent after any sequence of events
    #[test]
    fn prop_transitions_preserve_record_invariants(events in proptest::collection::vec(arb_event(), 0..30)) {
        let mut conv = Conversation::new("test-conv", Utc::now());

        for event in events {
            let ctx = test_context(&conv);
            if let Ok(result) = transition(&conv.state, &ctx, event) {
                conv.state = result.new_state;
                let applied = apply_effects(&mut conv, result.effects);
                prop_assert!(applied.is_ok(), "Effects rejected by record: {:?}", applied);
            }
            prop_assert!(records_are_ordered(&conv), "Ordering violated: {:?}", conv);
            prop_assert!(flags_are_exclusive(&conv), "Loading and resolved together: {:?}", conv);
            prop_assert!(state_matches_records(&conv), "State out of sync: {:?}", conv);
            prop_assert_eq!(conv.message_count(), conv.messages().len());
        }
    }

    // Invariant 2: Blank input never changes anything, in any state
    #[test]
    fn prop_blank_input_rejected(state in prop_oneof![Just(ConvState::Idle), arb_deliberating_state()], text in "[ \t\n]{0,6}") {
        let result = transition(&state, &ConvContext::new("c", 0), Event::UserMessage { text });
        prop_assert_eq!(result.unwrap_err(), TransitionError::EmptyInput);
    }

    // Invariant 3: A deliberating conversation rejects new messages
    #[test]
    fn prop_deliberating_rejects_messages(state in arb_deliberating_state(), text in "[a-z]{1,10}") {
        let result = transition(&state, &ConvContext::new("c", 0), Event::UserMessage { text });
        prop_assert_eq!(result.unwrap_err(), TransitionError::SubmissionInFlight);
    }

    // Invariant 4: Error state is always recoverable
    #[test]
    fn prop_error_always_recoverable(stage in arb_stage(), message in "[a-z ]{1,20}") {
        let state = ConvState::Error { stage, message };
        let result = transition(&state, &ConvContext::new("c", 2), Event::UserMessage { text: "retry".to_string() });
        prop_assert!(result.is_ok(), "Error recovery failed: {:?}", result);
        prop_assert_eq!(
            result.unwrap().new_state,
            ConvState::Deliberating { turn: 3, stage: Stage::Responses }
        );
    }

    // Invariant 5: Only the awaited stage is accepted
    #[test]
    fn prop_only_awaited_stage_accepted(
        state in arb_deliberating_state(),
        update in prop_oneof![arb_stage1(), arb_stage2(), arb_stage3()]
    ) {
        let awaited = state.awaited_stage();
        let got = update.stage();
        let result = transition(&state, &ConvContext::new("c", 0), Event::StageCompleted(update));
        prop_assert_eq!(result.is_ok(), awaited == Some(got));
    }

    // Invariant 6: Once the stream finishes nothing is left loading
    #[test]
    fn prop_finished_stream_leaves_no_spinner(events in proptest::collection::vec(arb_pipeline_event(), 0..10)) {
        let mut conv = Conversation::new("test-conv", Utc::now());
        let start = transition(&conv.state, &test_context(&conv), Event::UserMessage { text: "q".into() }).unwrap();
        conv.state = start.new_state;
        apply_effects(&mut conv, start.effects).unwrap();

        for event in events.into_iter().chain(std::iter::once(Event::PipelineFinished)) {
            let ctx = test_context(&conv);
            if let Ok(result) = transition(&conv.state, &ctx, event) {
                conv.state = result.new_state;
                apply_effects(&mut conv, result.effects).unwrap();
            }
        }

        prop_assert!(!conv.state.is_working());
        prop_assert!(conv.last_turn().is_some_and(|t| !t.is_in_flight()));
    }
}
