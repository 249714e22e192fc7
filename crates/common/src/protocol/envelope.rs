// Channel frame parsing: keep-alives, client-id announcements and batch updates.
//
// A frame is a sequence whose first slot is either the keep-alive marker or a
// `{"p": "<json>"}` mapping. The JSON inside `p` is a wrapper object keyed by
// field number: `"3"."2"` carries the client id, `"2"."2"` carries a nested
// JSON payload whose first element names its kind.

use std::collections::BTreeMap;

use crate::pblite::{CodingPath, DecodeError, Encode, PathSegment, PbliteDecoder};
use crate::pblite_message;
use crate::wire::{parse_repaired, sanitize, WireValue};

use super::messages::BatchUpdate;

pub const KEEP_ALIVE_MARKER: &str = "noop";
pub const BATCH_UPDATE_MARKER: &str = "cbu";

const WRAPPER_KEY: &str = "p";

pblite_message! {
    struct ChannelWrapper {
        2 => batch: Option<WrappedPayload>,
        3 => session: Option<ClientSession>,
    }
}

pblite_message! {
    struct WrappedPayload {
        2 => payload: Option<String>,
    }
}

pblite_message! {
    struct ClientSession {
        2 => client_id: Option<String>,
    }
}

/// One parsed channel frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    KeepAlive,
    Message(ChannelMessage),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChannelMessage {
    /// Present once per channel session, when the server assigns an id.
    pub client_id: Option<String>,
    pub payload: ChannelPayload,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ChannelPayload {
    #[default]
    None,
    BatchUpdate(BatchUpdate),
    /// A payload kind this client does not handle.
    Ignored { discriminator: String },
}

/// Sanitize and parse one raw frame.
pub fn parse_frame(text: &str) -> Result<Envelope, DecodeError> {
    let items = sanitize(text)?;
    parse_message(&items)
}

/// Parse an already-sanitized frame.
pub fn parse_message(items: &[WireValue]) -> Result<Envelope, DecodeError> {
    let head_path = CodingPath::root().child(PathSegment::Index(0));
    let head = items.first().ok_or_else(|| DecodeError::DataCorrupted {
        path: CodingPath::root(),
        message: "empty frame".to_string(),
    })?;

    let entries = match head {
        WireValue::String(marker) if marker == KEEP_ALIVE_MARKER => return Ok(Envelope::KeepAlive),
        WireValue::String(marker) => {
            return Ok(Envelope::Message(ChannelMessage {
                client_id: None,
                payload: ChannelPayload::Ignored { discriminator: marker.clone() },
            }))
        }
        WireValue::Mapping(entries) => entries,
        other => {
            return Err(DecodeError::TypeMismatch {
                path: head_path,
                expected: "wrapper mapping",
                found: other.describe(),
            })
        }
    };

    let wrapper_text = match entries.get(WRAPPER_KEY) {
        Some(WireValue::String(text)) => text,
        Some(other) => {
            return Err(DecodeError::TypeMismatch {
                path: head_path,
                expected: "string wrapper",
                found: other.describe(),
            })
        }
        None => {
            return Err(DecodeError::ValueNotFound { path: head_path, expected: "wrapper \"p\"" })
        }
    };

    let wrapper: ChannelWrapper = PbliteDecoder::new().decode(&parse_repaired(wrapper_text)?)?;
    let client_id = wrapper.session.and_then(|session| session.client_id);
    let payload = match wrapper.batch.and_then(|batch| batch.payload) {
        Some(text) => decode_payload(&text)?,
        None => ChannelPayload::None,
    };

    Ok(Envelope::Message(ChannelMessage { client_id, payload }))
}

/// Decode the nested payload text: `["cbu", [state updates...]]`.
pub fn decode_payload(text: &str) -> Result<ChannelPayload, DecodeError> {
    let mut items = sanitize(text)?;
    let discriminator = match items.first() {
        Some(WireValue::String(marker)) => marker.clone(),
        Some(other) => other.describe(),
        None => {
            return Err(DecodeError::DataCorrupted {
                path: CodingPath::root(),
                message: "empty payload".to_string(),
            })
        }
    };
    if discriminator != BATCH_UPDATE_MARKER {
        return Ok(ChannelPayload::Ignored { discriminator });
    }
    items.remove(0);
    let batch = PbliteDecoder::new().decode(&WireValue::Sequence(items))?;
    Ok(ChannelPayload::BatchUpdate(batch))
}

/// Render a frame in the server's shape. Used by replay fixtures and tests.
pub fn encode_frame(client_id: Option<&str>, batch: Option<&BatchUpdate>) -> String {
    let mut wrapper = BTreeMap::new();
    if let Some(batch) = batch {
        let mut payload = vec![WireValue::from(BATCH_UPDATE_MARKER)];
        if let WireValue::Sequence(fields) = batch.encode() {
            payload.extend(fields);
        }
        let inner = WrappedPayload { payload: Some(WireValue::Sequence(payload).to_string()) };
        wrapper.insert("2".to_string(), inner.encode_mapping());
    }
    if let Some(client_id) = client_id {
        let session = ClientSession { client_id: Some(client_id.to_string()) };
        wrapper.insert("3".to_string(), session.encode_mapping());
    }

    let mut head = BTreeMap::new();
    head.insert(WRAPPER_KEY.to_string(), WireValue::String(WireValue::Mapping(wrapper).to_string()));
    WireValue::Sequence(vec![WireValue::Mapping(head)]).to_string()
}

/// Keep-alive frame text.
pub fn keep_alive_frame() -> String {
    WireValue::Sequence(vec![WireValue::from(KEEP_ALIVE_MARKER)]).to_string()
}

impl WrappedPayload {
    fn encode_mapping(&self) -> WireValue {
        single_field_mapping(2, self.payload.clone().map(WireValue::String))
    }
}

impl ClientSession {
    fn encode_mapping(&self) -> WireValue {
        single_field_mapping(2, self.client_id.clone().map(WireValue::String))
    }
}

fn single_field_mapping(field: u32, value: Option<WireValue>) -> WireValue {
    let mut entries = BTreeMap::new();
    if let Some(value) = value {
        entries.insert(field.to_string(), value);
    }
    WireValue::Mapping(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pblite::DecodeErrorKind;
    use crate::protocol::messages::{StateUpdate, StateUpdateHeader};

    fn batch(times: &[u64]) -> BatchUpdate {
        BatchUpdate {
            state_update: times
                .iter()
                .map(|time| StateUpdate {
                    header: Some(StateUpdateHeader {
                        current_server_time: Some(*time),
                        ..Default::default()
                    }),
                    ..Default::default()
                })
                .collect(),
        }
    }

    #[test]
    fn keep_alive_carries_nothing() {
        assert_eq!(parse_frame(r#"["noop"]"#).expect("parse"), Envelope::KeepAlive);
        assert_eq!(parse_frame(&keep_alive_frame()).expect("parse"), Envelope::KeepAlive);
    }

    #[test]
    fn client_id_announcement() {
        let frame = r#"[{"p":"{\"1\":{\"1\":{\"1\":{\"1\":1,\"2\":1}}},\"3\":{\"1\":{\"1\":1},\"2\":\"lcsw_hangouts_ABCD\"}}"}]"#;
        match parse_frame(frame).expect("parse") {
            Envelope::Message(message) => {
                assert_eq!(message.client_id.as_deref(), Some("lcsw_hangouts_ABCD"));
                assert_eq!(message.payload, ChannelPayload::None);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn batch_update_payload_with_sparse_slots() {
        let payload = r#"["cbu",[[[1,,,,"1500"]],[[,,,,"1600"]]]]"#;
        let wrapper = serde_json::json!({"2": {"2": payload}}).to_string();
        let frame = serde_json::json!([{ "p": wrapper }]).to_string();
        let Envelope::Message(message) = parse_frame(&frame).expect("parse") else {
            panic!("expected message");
        };
        let ChannelPayload::BatchUpdate(batch) = message.payload else {
            panic!("expected batch update");
        };
        let times: Vec<_> = batch.state_update.iter().map(StateUpdate::current_server_time).collect();
        assert_eq!(times, vec![Some(1500), Some(1600)]);
    }

    #[test]
    fn other_discriminators_are_ignored() {
        let payload = decode_payload(r#"["bfo",[1]]"#).expect("payload");
        assert_eq!(payload, ChannelPayload::Ignored { discriminator: "bfo".to_string() });
    }

    #[test]
    fn encoded_frame_parses_back() {
        let expected = batch(&[10, 20]);
        let frame = encode_frame(Some("client-7"), Some(&expected));
        let Envelope::Message(message) = parse_frame(&frame).expect("parse") else {
            panic!("expected message");
        };
        assert_eq!(message.client_id.as_deref(), Some("client-7"));
        assert_eq!(message.payload, ChannelPayload::BatchUpdate(expected));
    }

    #[test]
    fn malformed_frames_are_errors() {
        assert_eq!(parse_frame("[").expect_err("bad json").kind(), DecodeErrorKind::DataCorrupted);
        assert_eq!(parse_frame("[]").expect_err("empty").kind(), DecodeErrorKind::DataCorrupted);
        assert_eq!(parse_frame("[7]").expect_err("number").kind(), DecodeErrorKind::TypeMismatch);
        assert_eq!(
            parse_frame(r#"[{"q":"x"}]"#).expect_err("no wrapper").kind(),
            DecodeErrorKind::ValueNotFound
        );
    }
}
