use hangwire_common::pblite::{DecodeErrorKind, DecoderOptions, Encode, PbliteDecoder};
use hangwire_common::protocol::messages::{
    ActiveClientState, BatchUpdate, ClientEvent, ConversationId, ConversationState, StateUpdate,
    StateUpdatePayload, SyncAllNewEventsResponse,
};
use hangwire_common::wire::{sanitize, WireValue};
use proptest::prelude::*;

fn wire(value: serde_json::Value) -> WireValue {
    WireValue::from(value)
}

#[test]
fn field_k_reads_position_k_minus_one() {
    let value = wire(serde_json::json!([["c1"], null, "77"]));
    let event: ClientEvent = PbliteDecoder::new().decode(&value).expect("decode");
    assert_eq!(event.conversation_key(), Some("c1"));
    assert_eq!(event.sender_id, None);
    assert_eq!(event.timestamp, Some(77));
}

#[test]
fn trailing_numeric_mapping_addresses_high_fields() {
    let value = wire(serde_json::json!([["c1"], null, "77", {"12": "event-9", "23": 1}]));
    let event: ClientEvent = PbliteDecoder::new().decode(&value).expect("decode");
    assert_eq!(event.event_id.as_deref(), Some("event-9"));
    assert!(event.event_type.is_some());
}

#[test]
fn integer_coercion_accepts_strings_and_numbers_only() {
    let decoder = PbliteDecoder::with_options(DecoderOptions {
        primitive_root_values: true,
        ..Default::default()
    });
    assert_eq!(decoder.decode::<i64>(&WireValue::from("42")).expect("string"), 42);
    assert_eq!(decoder.decode::<i64>(&WireValue::int(42)).expect("number"), 42);
    let error = decoder.decode::<i64>(&WireValue::from("abc")).expect_err("garbage");
    assert_eq!(error.kind(), DecodeErrorKind::TypeMismatch);
    assert!(error.to_string().contains("abc"));
}

#[test]
fn sanitizer_fills_empty_slot() {
    let items = sanitize("[1,,3]").expect("sanitize");
    assert_eq!(items, vec![WireValue::int(1), WireValue::Null, WireValue::int(3)]);
}

#[test]
fn absent_or_null_repeated_field_is_empty() {
    let absent: ConversationState =
        PbliteDecoder::new().decode(&wire(serde_json::json!([["c"]]))).expect("absent");
    assert!(absent.event.is_empty());

    let null: ConversationState =
        PbliteDecoder::new().decode(&wire(serde_json::json!([["c"], null, null]))).expect("null");
    assert!(null.event.is_empty());
}

#[test]
fn sync_response_from_raw_text() {
    let text = r#"["csanerp",[1,,,,"2000"],"2000",[[["c1"],[["c1"],2,"Team"],[[["c1"],,"1900"]]]]]"#;
    let response: SyncAllNewEventsResponse =
        PbliteDecoder::new().decode_response(text).expect("response");
    assert!(response.response_header.as_ref().expect("header").is_ok());
    assert_eq!(response.sync_timestamp, Some(2000));
    assert_eq!(response.conversation_state.len(), 1);
    let state = &response.conversation_state[0];
    assert_eq!(state.conversation_key(), Some("c1"));
    assert_eq!(state.event[0].timestamp(), 1900);
}

#[test]
fn batch_update_error_carries_path() {
    let value = wire(serde_json::json!([[[[1, null, null, null, "not-a-time"]]]]));
    let error = PbliteDecoder::new().decode::<BatchUpdate>(&value).expect_err("bad time");
    assert_eq!(error.kind(), DecodeErrorKind::TypeMismatch);
    assert_eq!(error.path().to_string(), "$.1[0].1.5");
}

#[test]
fn decoded_batch_preserves_order() {
    let value = wire(serde_json::json!([[
        [[0, null, null, null, "3"]],
        [[1, null, null, null, "1"]],
        [[2, null, null, null, "2"]]
    ]]));
    let batch: BatchUpdate = PbliteDecoder::new().decode(&value).expect("decode");
    let states: Vec<_> = batch.state_update.iter().map(|u| u.active_client_state()).collect();
    assert_eq!(
        states,
        vec![
            Some(ActiveClientState::NoActive),
            Some(ActiveClientState::IsActive),
            Some(ActiveClientState::OtherActive)
        ]
    );
    assert!(batch.state_update.iter().all(|u| u.payload == StateUpdatePayload::Empty));
}

#[test]
fn unknown_extension_payload_reencodes_without_growing_slots() {
    let value = wire(serde_json::json!([[1, null, null, null, "10"], {"4000000000": "x"}]));
    let update: StateUpdate = PbliteDecoder::new().decode(&value).expect("decode");
    assert_eq!(
        update.payload,
        StateUpdatePayload::Other { field: 4_000_000_000, value: WireValue::from("x") }
    );

    let encoded = update.encode();
    assert_eq!(encoded.as_sequence().map(<[WireValue]>::len), Some(2));
    let again: StateUpdate = PbliteDecoder::new().decode(&encoded).expect("decode again");
    assert_eq!(again, update);
}

fn render_sparse(items: &[Option<i64>]) -> String {
    let slots: Vec<String> =
        items.iter().map(|item| item.map(|n| n.to_string()).unwrap_or_default()).collect();
    format!("[{}]", slots.join(","))
}

fn arb_event() -> impl Strategy<Value = ClientEvent> {
    (
        proptest::option::of("[a-z0-9]{1,12}"),
        proptest::option::of(any::<u64>()),
        proptest::option::of("[a-zA-Z0-9_-]{0,16}"),
    )
        .prop_map(|(conversation, timestamp, event_id)| ClientEvent {
            conversation_id: conversation.map(ConversationId::new),
            timestamp,
            event_id,
            ..Default::default()
        })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        max_shrink_iters: 64,
        .. ProptestConfig::default()
    })]

    #[test]
    fn sanitizer_turns_empty_slots_into_nulls(items in prop::collection::vec(proptest::option::of(any::<i64>()), 0..16)) {
        prop_assume!(items.as_slice() != [None]);
        let parsed = sanitize(&render_sparse(&items)).expect("sanitize");
        let expected: Vec<WireValue> =
            items.iter().map(|item| item.map(WireValue::int).unwrap_or(WireValue::Null)).collect();
        prop_assert_eq!(parsed, expected);
    }

    #[test]
    fn decode_encode_decode_is_stable(events in prop::collection::vec(arb_event(), 0..8)) {
        let state = ConversationState {
            conversation_id: Some(ConversationId::new("c")),
            conversation: None,
            event: events,
        };
        let first: ConversationState = PbliteDecoder::new().decode(&state.encode()).expect("first");
        let second: ConversationState = PbliteDecoder::new().decode(&first.encode()).expect("second");
        prop_assert_eq!(&first, &state);
        prop_assert_eq!(second, first);
    }
}
