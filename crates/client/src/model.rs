// Conversation model collaborator and an in-memory implementation.

use std::collections::BTreeMap;

use hangwire_common::protocol::messages::{ClientEvent, Conversation};

/// Local conversation storage the coordinator writes into.
///
/// The coordinator only calls these hooks; it never keeps its own copy of
/// conversations.
pub trait ConversationModel: Send {
    /// Opaque reference to an appended event, passed back to `handle_event`.
    type EventHandle: Send;

    fn lookup_conversation(&self, id: &str) -> Option<&Conversation>;

    fn update_conversation(&mut self, id: &str, snapshot: &Conversation);

    fn append_event(&mut self, conversation_id: &str, event: &ClientEvent) -> Self::EventHandle;

    /// Run per-event logic (unread counts, notifications) after an append.
    fn handle_event(&mut self, conversation_id: &str, handle: &Self::EventHandle);

    fn create_conversation(&mut self, snapshot: &Conversation, events: &[ClientEvent]);

    /// Another participant's read watermark moved.
    fn update_read_state(&mut self, _conversation_id: &str, _latest_read_timestamp: u64) {}
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationEntry {
    pub snapshot: Conversation,
    pub events: Vec<ClientEvent>,
    /// Indices into `events`, in the order `handle_event` saw them.
    pub handled: Vec<usize>,
    pub latest_read_timestamp: Option<u64>,
}

impl ConversationEntry {
    pub fn event_timestamps(&self) -> Vec<u64> {
        self.events.iter().map(ClientEvent::timestamp).collect()
    }
}

/// Map-backed model used by the replay tool and tests.
#[derive(Debug, Default)]
pub struct InMemoryModel {
    conversations: BTreeMap<String, ConversationEntry>,
}

impl InMemoryModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conversation(&self, id: &str) -> Option<&ConversationEntry> {
        self.conversations.get(id)
    }

    pub fn conversations(&self) -> impl Iterator<Item = (&str, &ConversationEntry)> {
        self.conversations.iter().map(|(id, entry)| (id.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }
}

impl ConversationModel for InMemoryModel {
    type EventHandle = usize;

    fn lookup_conversation(&self, id: &str) -> Option<&Conversation> {
        self.conversations.get(id).map(|entry| &entry.snapshot)
    }

    fn update_conversation(&mut self, id: &str, snapshot: &Conversation) {
        self.conversations.entry(id.to_string()).or_default().snapshot = snapshot.clone();
    }

    fn append_event(&mut self, conversation_id: &str, event: &ClientEvent) -> usize {
        let entry = self.conversations.entry(conversation_id.to_string()).or_default();
        entry.events.push(event.clone());
        entry.events.len() - 1
    }

    fn handle_event(&mut self, conversation_id: &str, handle: &usize) {
        if let Some(entry) = self.conversations.get_mut(conversation_id) {
            entry.handled.push(*handle);
        }
    }

    fn create_conversation(&mut self, snapshot: &Conversation, events: &[ClientEvent]) {
        let Some(id) = snapshot.conversation_key() else {
            return;
        };
        self.conversations.insert(
            id.to_string(),
            ConversationEntry {
                snapshot: snapshot.clone(),
                events: events.to_vec(),
                handled: Vec::new(),
                latest_read_timestamp: None,
            },
        );
    }

    fn update_read_state(&mut self, conversation_id: &str, latest_read_timestamp: u64) {
        if let Some(entry) = self.conversations.get_mut(conversation_id) {
            let current = entry.latest_read_timestamp.unwrap_or(0);
            entry.latest_read_timestamp = Some(current.max(latest_read_timestamp));
        }
    }
}
