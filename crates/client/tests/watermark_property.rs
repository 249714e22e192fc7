use hangwire_client::model::{ConversationModel, InMemoryModel};
use hangwire_client::sync::{apply_state_update, apply_sync_response, SyncState};
use hangwire_common::protocol::messages::{
    ClientEvent, Conversation, ConversationId, ConversationState, EventNotification, StateUpdate,
    StateUpdateHeader, StateUpdatePayload, SyncAllNewEventsResponse,
};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Step {
    Live { server_time: Option<u64>, event_time: u64 },
    Resync { sync_timestamp: Option<u64>, event_times: Vec<u64> },
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        (proptest::option::of(0u64..10_000), 0u64..10_000)
            .prop_map(|(server_time, event_time)| Step::Live { server_time, event_time }),
        (proptest::option::of(0u64..10_000), proptest::collection::vec(0u64..10_000, 0..6))
            .prop_map(|(sync_timestamp, event_times)| Step::Resync { sync_timestamp, event_times }),
    ]
}

fn event(timestamp: u64) -> ClientEvent {
    ClientEvent {
        conversation_id: Some(ConversationId::new("c1")),
        timestamp: Some(timestamp),
        ..Default::default()
    }
}

fn apply(state: &mut SyncState, model: &mut InMemoryModel, step: &Step) {
    match step {
        Step::Live { server_time, event_time } => {
            let update = StateUpdate {
                header: Some(StateUpdateHeader {
                    current_server_time: *server_time,
                    ..Default::default()
                }),
                payload: StateUpdatePayload::Event(EventNotification {
                    event: Some(event(*event_time)),
                }),
                conversation: None,
            };
            apply_state_update(state, model, &update);
        }
        Step::Resync { sync_timestamp, event_times } => {
            let response = SyncAllNewEventsResponse {
                response_header: None,
                sync_timestamp: *sync_timestamp,
                conversation_state: vec![ConversationState {
                    conversation_id: Some(ConversationId::new("c1")),
                    conversation: None,
                    event: event_times.iter().copied().map(event).collect(),
                }],
            };
            apply_sync_response(state, model, &response);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        max_shrink_iters: 256,
        ..ProptestConfig::default()
    })]

    #[test]
    fn watermark_never_decreases(steps in proptest::collection::vec(step(), 1..24)) {
        let mut state = SyncState::new();
        let mut model = InMemoryModel::new();
        model.create_conversation(
            &Conversation { conversation_id: Some(ConversationId::new("c1")), ..Default::default() },
            &[],
        );

        for step in &steps {
            let before = state.last_sync_timestamp;
            apply(&mut state, &mut model, step);
            prop_assert!(state.last_sync_timestamp >= before);
        }
    }

    #[test]
    fn resync_never_replays_events_at_or_below_watermark(
        watermark in 1u64..5_000,
        event_times in proptest::collection::vec(0u64..10_000, 0..12),
    ) {
        let mut state = SyncState { last_sync_timestamp: watermark, ..SyncState::new() };
        let mut model = InMemoryModel::new();
        model.create_conversation(
            &Conversation { conversation_id: Some(ConversationId::new("c1")), ..Default::default() },
            &[],
        );

        apply(&mut state, &mut model, &Step::Resync {
            sync_timestamp: Some(10_000),
            event_times: event_times.clone(),
        });

        let expected: Vec<u64> = event_times.into_iter().filter(|ts| *ts > watermark).collect();
        let applied = model.conversation("c1").map(|entry| entry.event_timestamps());
        prop_assert_eq!(applied, Some(expected));
        prop_assert_eq!(state.last_sync_timestamp, 10_000);
    }
}
