//! Property-based tests for the turn state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::state::*;
use super::transition::*;
use super::*;
use crate::conversation::{AssistantMessage, Message, ToolCall, ToolResultMessage};
use proptest::prelude::*;
use serde_json::json;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_tool_call() -> impl Strategy<Value = ToolCall> {
    ("[a-z]{8}", prop_oneof![Just("web_search"), Just("other")], "[a-zA-Z ]{0,30}")
        .prop_map(|(id, name, query)| ToolCall::new(id, name, json!({ "query": query })))
}

fn arb_assistant_message() -> impl Strategy<Value = AssistantMessage> {
    ("[a-zA-Z .]{0,40}", prop::collection::vec(arb_tool_call(), 0..4)).prop_map(
        |(text, tool_calls)| AssistantMessage { text, tool_calls },
    )
}

fn arb_tool_turn_state() -> impl Strategy<Value = TurnState> {
    (prop::collection::vec(arb_tool_call(), 1..4), 2u32..30)
        .prop_map(|(pending, step)| TurnState::ToolTurn { pending, step })
}

fn arb_terminal_state() -> impl Strategy<Value = TurnState> {
    prop_oneof![
        Just(TurnState::Done),
        "[a-z ]{1,20}".prop_map(|message| TurnState::Failed { message }),
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        arb_assistant_message().prop_map(|message| Event::ModelResponded { message }),
        "[a-z ]{1,20}".prop_map(|message| Event::ModelFailed { message }),
        Just(Event::ToolsCompleted { results: vec![] }),
    ]
}

/// A tool turn plus a subset of its pending calls answered
fn arb_tool_turn_with_results() -> impl Strategy<Value = (TurnState, Vec<ToolResultMessage>)> {
    arb_tool_turn_state().prop_flat_map(|state| {
        let TurnState::ToolTurn { pending, .. } = &state else {
            unreachable!("generator only produces tool turns");
        };
        let len = pending.len();
        (Just(state), prop::collection::vec(any::<bool>(), len))
    })
    .prop_map(|(state, keep)| {
        let TurnState::ToolTurn { pending, .. } = &state else {
            unreachable!("generator only produces tool turns");
        };
        let results = pending
            .iter()
            .zip(keep)
            .filter(|(_, keep)| *keep)
            .map(|(call, _)| ToolResultMessage::success(call, "[]"))
            .collect();
        (state, results)
    })
}

fn context(max_steps: u32) -> TurnContext {
    TurnContext::new("prop-session").with_max_steps(max_steps)
}

proptest! {
    #[test]
    fn terminal_states_reject_every_event(state in arb_terminal_state(), event in arb_event()) {
        let result = transition(&state, &context(25), event);
        prop_assert!(matches!(result, Err(TransitionError::Terminal(_))));
    }

    #[test]
    fn model_response_appends_exactly_one_assistant_message(
        message in arb_assistant_message(),
        step in 1u32..30,
    ) {
        let result = transition(
            &TurnState::ModelTurn { step },
            &context(25),
            Event::ModelResponded { message: message.clone() },
        ).unwrap();

        let appended: Vec<&Message> = result
            .effects
            .iter()
            .filter_map(|e| match e {
                Effect::AppendMessages(m) => Some(m),
                _ => None,
            })
            .flatten()
            .collect();
        let expected = Message::Assistant(message);
        prop_assert_eq!(appended, vec![&expected]);
    }

    #[test]
    fn tool_calls_are_invoked_in_model_order(message in arb_assistant_message()) {
        prop_assume!(message.has_tool_calls());
        let result = transition(
            &TurnState::default(),
            &context(25),
            Event::ModelResponded { message: message.clone() },
        ).unwrap();

        let invoked = result.effects.iter().find_map(|e| match e {
            Effect::InvokeTools(calls) => Some(calls.clone()),
            _ => None,
        });
        prop_assert_eq!(invoked, Some(message.tool_calls));
    }

    #[test]
    fn no_tool_calls_means_done(text in "[a-zA-Z ]{0,40}", step in 1u32..30) {
        let result = transition(
            &TurnState::ModelTurn { step },
            &context(25),
            Event::ModelResponded { message: AssistantMessage::text(text) },
        ).unwrap();
        prop_assert_eq!(result.new_state, TurnState::Done);
        prop_assert_eq!(result.effects.last(), Some(&Effect::Finish));
    }

    #[test]
    fn tool_results_answer_only_pending_calls(
        (state, results) in arb_tool_turn_with_results(),
        max_steps in 1u32..40,
    ) {
        let count = results.len();
        let result = transition(
            &state,
            &context(max_steps),
            Event::ToolsCompleted { results },
        ).unwrap();

        let appended: usize = result
            .effects
            .iter()
            .map(|e| match e {
                Effect::AppendMessages(m) => m.len(),
                _ => 0,
            })
            .sum();
        prop_assert_eq!(appended, count);
        let resumed = matches!(
            result.new_state,
            TurnState::ModelTurn { .. } | TurnState::Failed { .. }
        );
        prop_assert!(resumed, "unexpected state {:?}", result.new_state);
    }

    #[test]
    fn non_terminal_steps_never_exceed_limit(
        state in prop_oneof![
            (1u32..30).prop_map(|step| TurnState::ModelTurn { step }),
            arb_tool_turn_state(),
        ],
        event in arb_event(),
        max_steps in 1u32..30,
    ) {
        prop_assume!(state.step() <= max_steps);
        if let Ok(result) = transition(&state, &context(max_steps), event) {
            if !result.new_state.is_terminal() {
                prop_assert!(result.new_state.step() <= max_steps);
                prop_assert_eq!(result.new_state.step(), state.step() + 1);
            }
        }
    }
}
