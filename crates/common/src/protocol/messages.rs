// Protocol message definitions with their wire field numbers.

use crate::pblite::{Decode, DecodeError, Decoder, Encode, PositionalWriter};
use crate::wire::WireValue;
use crate::{pblite_enum, pblite_message};

// ── Enums ──────────────────────────────────────────────────────────

pblite_enum! {
    /// Which of the account's clients currently receives live notifications.
    pub enum ActiveClientState {
        NoActive = 0,
        IsActive = 1,
        OtherActive = 2,
    }
}

pblite_enum! {
    pub enum ConversationType {
        Unknown = 0,
        OneToOne = 1,
        Group = 2,
    }
}

pblite_enum! {
    pub enum ResponseStatus {
        Unknown = 0,
        Ok = 1,
        Busy = 2,
        UnexpectedError = 3,
        InvalidRequest = 4,
    }
}

pblite_enum! {
    pub enum TypingStatus {
        Unknown = 0,
        Started = 1,
        Paused = 2,
        Stopped = 3,
    }
}

pblite_enum! {
    pub enum FocusType {
        Unknown = 0,
        Focused = 1,
        Unfocused = 2,
    }
}

pblite_enum! {
    pub enum SegmentType {
        Text = 0,
        LineBreak = 1,
        Link = 2,
    }
}

pblite_enum! {
    pub enum EventType {
        Unknown = 0,
        RegularChatMessage = 1,
        Sms = 2,
        Voicemail = 3,
        AddUser = 4,
        RemoveUser = 5,
        ConversationRename = 6,
        Hangout = 7,
    }
}

// ── Identity ───────────────────────────────────────────────────────

pblite_message! {
    pub struct ConversationId {
        1 => id: Option<String>,
    }
}

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: Some(id.into()) }
    }
}

pblite_message! {
    pub struct ParticipantId {
        1 => gaia_id: Option<String>,
        2 => chat_id: Option<String>,
    }
}

// ── Events ─────────────────────────────────────────────────────────

pblite_message! {
    pub struct Segment {
        1 => segment_type: Option<SegmentType>,
        2 => text: Option<String>,
    }
}

pblite_message! {
    pub struct MessageContent {
        1 => segment: Vec<Segment>,
    }
}

pblite_message! {
    pub struct ChatMessage {
        3 => message_content: Option<MessageContent>,
    }
}

pblite_message! {
    pub struct ConversationRename {
        1 => new_name: Option<String>,
        2 => old_name: Option<String>,
    }
}

pblite_message! {
    /// One entry of a conversation's event log.
    pub struct ClientEvent {
        1 => conversation_id: Option<ConversationId>,
        2 => sender_id: Option<ParticipantId>,
        /// Server time in microseconds.
        3 => timestamp: Option<u64>,
        7 => chat_message: Option<ChatMessage>,
        10 => conversation_rename: Option<ConversationRename>,
        12 => event_id: Option<String>,
        23 => event_type: Option<EventType>,
    }
}

impl ClientEvent {
    pub fn conversation_key(&self) -> Option<&str> {
        self.conversation_id.as_ref().and_then(|id| id.id.as_deref())
    }

    /// Event timestamp, or 0 when the server omitted it.
    pub fn timestamp(&self) -> u64 {
        self.timestamp.unwrap_or(0)
    }

    /// Concatenated text of all chat segments; line breaks become `\n`.
    pub fn text(&self) -> String {
        let Some(content) = self.chat_message.as_ref().and_then(|m| m.message_content.as_ref())
        else {
            return String::new();
        };
        content
            .segment
            .iter()
            .map(|segment| match segment.segment_type {
                Some(SegmentType::LineBreak) => "\n",
                _ => segment.text.as_deref().unwrap_or(""),
            })
            .collect()
    }
}

// ── Conversations ──────────────────────────────────────────────────

pblite_message! {
    pub struct ParticipantData {
        1 => id: Option<ParticipantId>,
        2 => fallback_name: Option<String>,
    }
}

pblite_message! {
    pub struct Conversation {
        1 => conversation_id: Option<ConversationId>,
        2 => conversation_type: Option<ConversationType>,
        3 => name: Option<String>,
        12 => current_participant: Vec<ParticipantId>,
        13 => participant_data: Vec<ParticipantData>,
    }
}

impl Conversation {
    pub fn conversation_key(&self) -> Option<&str> {
        self.conversation_id.as_ref().and_then(|id| id.id.as_deref())
    }
}

pblite_message! {
    /// Per-conversation snapshot returned by a resync.
    pub struct ConversationState {
        1 => conversation_id: Option<ConversationId>,
        2 => conversation: Option<Conversation>,
        3 => event: Vec<ClientEvent>,
    }
}

impl ConversationState {
    /// Id from the state itself, falling back to the embedded snapshot.
    pub fn conversation_key(&self) -> Option<&str> {
        self.conversation_id
            .as_ref()
            .and_then(|id| id.id.as_deref())
            .or_else(|| self.conversation.as_ref().and_then(Conversation::conversation_key))
    }
}

// ── Live updates ───────────────────────────────────────────────────

pblite_message! {
    pub struct StateUpdateHeader {
        1 => active_client_state: Option<ActiveClientState>,
        3 => request_trace_id: Option<String>,
        5 => current_server_time: Option<u64>,
    }
}

pblite_message! {
    pub struct ConversationNotification {
        1 => conversation: Option<Conversation>,
    }
}

pblite_message! {
    pub struct EventNotification {
        1 => event: Option<ClientEvent>,
    }
}

pblite_message! {
    pub struct SetFocusNotification {
        1 => conversation_id: Option<ConversationId>,
        2 => sender_id: Option<ParticipantId>,
        3 => timestamp: Option<u64>,
        4 => focus_type: Option<FocusType>,
    }
}

pblite_message! {
    pub struct SetTypingNotification {
        1 => conversation_id: Option<ConversationId>,
        2 => sender_id: Option<ParticipantId>,
        3 => timestamp: Option<u64>,
        4 => status: Option<TypingStatus>,
    }
}

pblite_message! {
    pub struct WatermarkNotification {
        1 => sender_id: Option<ParticipantId>,
        2 => conversation_id: Option<ConversationId>,
        3 => latest_read_timestamp: Option<u64>,
    }
}

const CONVERSATION_NOTIFICATION_FIELD: u32 = 2;
const EVENT_NOTIFICATION_FIELD: u32 = 3;
const FOCUS_NOTIFICATION_FIELD: u32 = 4;
const TYPING_NOTIFICATION_FIELD: u32 = 5;
const WATERMARK_NOTIFICATION_FIELD: u32 = 8;
const STATE_UPDATE_HEADER_FIELD: u32 = 1;
const STATE_UPDATE_CONVERSATION_FIELD: u32 = 13;

/// The one-of payload carried by a [`StateUpdate`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum StateUpdatePayload {
    Conversation(ConversationNotification),
    Event(EventNotification),
    Focus(SetFocusNotification),
    Typing(SetTypingNotification),
    Watermark(WatermarkNotification),
    /// A variant this client does not model, kept raw.
    Other { field: u32, value: WireValue },
    #[default]
    Empty,
}

impl StateUpdatePayload {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Conversation(_) => "conversation",
            Self::Event(_) => "event",
            Self::Focus(_) => "focus",
            Self::Typing(_) => "typing",
            Self::Watermark(_) => "watermark",
            Self::Other { .. } => "other",
            Self::Empty => "empty",
        }
    }

    /// Conversation the payload refers to, when it names one.
    pub fn conversation_key(&self) -> Option<&str> {
        let id = match self {
            Self::Conversation(n) => n.conversation.as_ref()?.conversation_id.as_ref(),
            Self::Event(n) => n.event.as_ref()?.conversation_id.as_ref(),
            Self::Focus(n) => n.conversation_id.as_ref(),
            Self::Typing(n) => n.conversation_id.as_ref(),
            Self::Watermark(n) => n.conversation_id.as_ref(),
            Self::Other { .. } | Self::Empty => None,
        };
        id.and_then(|id| id.id.as_deref())
    }
}

/// One state change pushed by the server.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StateUpdate {
    pub header: Option<StateUpdateHeader>,
    pub payload: StateUpdatePayload,
    /// Full conversation snapshot some updates carry alongside the payload.
    pub conversation: Option<Conversation>,
}

impl StateUpdate {
    pub fn active_client_state(&self) -> Option<ActiveClientState> {
        self.header.as_ref().and_then(|header| header.active_client_state)
    }

    pub fn current_server_time(&self) -> Option<u64> {
        self.header.as_ref().and_then(|header| header.current_server_time)
    }
}

impl Decode for StateUpdate {
    fn decode(decoder: &mut Decoder<'_>) -> Result<Self, DecodeError> {
        let container = decoder.keyed()?;
        let header = container.decode(STATE_UPDATE_HEADER_FIELD)?;
        let conversation = container.decode(STATE_UPDATE_CONVERSATION_FIELD)?;

        let payload_field = container
            .fields()
            .into_iter()
            .find(|field| *field != STATE_UPDATE_HEADER_FIELD && *field != STATE_UPDATE_CONVERSATION_FIELD);
        let payload = match payload_field {
            None => StateUpdatePayload::Empty,
            Some(CONVERSATION_NOTIFICATION_FIELD) => {
                StateUpdatePayload::Conversation(container.decode(CONVERSATION_NOTIFICATION_FIELD)?)
            }
            Some(EVENT_NOTIFICATION_FIELD) => {
                StateUpdatePayload::Event(container.decode(EVENT_NOTIFICATION_FIELD)?)
            }
            Some(FOCUS_NOTIFICATION_FIELD) => {
                StateUpdatePayload::Focus(container.decode(FOCUS_NOTIFICATION_FIELD)?)
            }
            Some(TYPING_NOTIFICATION_FIELD) => {
                StateUpdatePayload::Typing(container.decode(TYPING_NOTIFICATION_FIELD)?)
            }
            Some(WATERMARK_NOTIFICATION_FIELD) => {
                StateUpdatePayload::Watermark(container.decode(WATERMARK_NOTIFICATION_FIELD)?)
            }
            Some(field) => StateUpdatePayload::Other { field, value: container.decode(field)? },
        };

        Ok(Self { header, payload, conversation })
    }
}

impl Encode for StateUpdate {
    fn encode(&self) -> WireValue {
        let mut writer = PositionalWriter::new();
        writer.field(STATE_UPDATE_HEADER_FIELD, &self.header);
        match &self.payload {
            StateUpdatePayload::Conversation(n) => writer.field(CONVERSATION_NOTIFICATION_FIELD, n),
            StateUpdatePayload::Event(n) => writer.field(EVENT_NOTIFICATION_FIELD, n),
            StateUpdatePayload::Focus(n) => writer.field(FOCUS_NOTIFICATION_FIELD, n),
            StateUpdatePayload::Typing(n) => writer.field(TYPING_NOTIFICATION_FIELD, n),
            StateUpdatePayload::Watermark(n) => writer.field(WATERMARK_NOTIFICATION_FIELD, n),
            StateUpdatePayload::Other { field, value } => writer.field(*field, value),
            StateUpdatePayload::Empty => &mut writer,
        };
        writer.field(STATE_UPDATE_CONVERSATION_FIELD, &self.conversation);
        writer.finish()
    }
}

pblite_message! {
    /// Ordered batch of live state updates.
    pub struct BatchUpdate {
        1 => state_update: Vec<StateUpdate>,
    }
}

// ── Requests and responses ─────────────────────────────────────────

pblite_message! {
    pub struct ClientIdentifier {
        1 => resource: Option<String>,
        2 => header_id: Option<String>,
    }
}

pblite_message! {
    pub struct RequestHeader {
        1 => client_version: Option<WireValue>,
        2 => client_identifier: Option<ClientIdentifier>,
        4 => language_code: Option<String>,
    }
}

impl RequestHeader {
    pub fn for_client(client_id: Option<&str>) -> Self {
        Self {
            client_version: None,
            client_identifier: Some(ClientIdentifier {
                resource: client_id.map(str::to_string),
                header_id: None,
            }),
            language_code: Some("en".to_string()),
        }
    }
}

pblite_message! {
    pub struct ResponseHeader {
        1 => status: Option<ResponseStatus>,
        2 => error_description: Option<String>,
        4 => request_trace_id: Option<String>,
        5 => current_server_time: Option<u64>,
    }
}

impl ResponseHeader {
    pub fn is_ok(&self) -> bool {
        self.status == Some(ResponseStatus::Ok)
    }
}

pblite_message! {
    pub struct SyncAllNewEventsRequest {
        1 => request_header: Option<RequestHeader>,
        2 => last_sync_timestamp: Option<u64>,
        8 => max_response_size_bytes: Option<u64>,
    }
}

pblite_message! {
    pub struct SyncAllNewEventsResponse {
        1 => response_header: Option<ResponseHeader>,
        2 => sync_timestamp: Option<u64>,
        3 => conversation_state: Vec<ConversationState>,
    }
}

pblite_message! {
    pub struct SetActiveClientRequest {
        1 => request_header: Option<RequestHeader>,
        2 => is_active: Option<bool>,
        /// `<email>/<client_id>`
        3 => full_jid: Option<String>,
        4 => timeout_secs: Option<u32>,
    }
}

pblite_message! {
    pub struct SetActiveClientResponse {
        1 => response_header: Option<ResponseHeader>,
    }
}

pblite_message! {
    pub struct GetSelfInfoRequest {
        1 => request_header: Option<RequestHeader>,
    }
}

pblite_message! {
    pub struct EntityProperties {
        2 => display_name: Option<String>,
        3 => first_name: Option<String>,
        4 => photo_url: Option<String>,
        5 => email: Vec<String>,
    }
}

pblite_message! {
    pub struct Entity {
        9 => id: Option<ParticipantId>,
        11 => properties: Option<EntityProperties>,
    }
}

pblite_message! {
    pub struct GetSelfInfoResponse {
        1 => response_header: Option<ResponseHeader>,
        2 => self_entity: Option<Entity>,
    }
}

impl GetSelfInfoResponse {
    pub fn primary_email(&self) -> Option<&str> {
        self.self_entity
            .as_ref()
            .and_then(|entity| entity.properties.as_ref())
            .and_then(|properties| properties.email.first())
            .map(String::as_str)
    }
}
