// Applying resync responses and live state updates to the model.

use hangwire_common::protocol::messages::{
    ClientEvent, Conversation, ConversationId, StateUpdate, StateUpdatePayload,
    SyncAllNewEventsResponse,
};
use tracing::{debug, warn};

use crate::model::ConversationModel;

use super::state::{event_key, SyncState};

/// Counts from one applied resync response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub conversations_updated: usize,
    pub conversations_created: usize,
    pub events_applied: usize,
    /// Events at or below the request's watermark, or already applied live.
    pub events_skipped: usize,
    pub previous_watermark: u64,
    /// Watermark after the response was applied.
    pub sync_timestamp: u64,
}

/// Apply a "sync all new events" response.
///
/// For known conversations, events at or below the watermark the request was
/// sent from are skipped, as are events already applied live while the
/// request was in flight. Unknown conversations are created from their
/// snapshot with every event. The watermark then moves to the response's sync
/// timestamp, never backwards.
pub fn apply_sync_response<M: ConversationModel>(
    state: &mut SyncState,
    model: &mut M,
    response: &SyncAllNewEventsResponse,
) -> SyncReport {
    let (watermark, applied_live) = state.finish_resync();
    let mut report = SyncReport { previous_watermark: watermark, ..SyncReport::default() };
    let mut newest_applied = 0u64;

    for conversation_state in &response.conversation_state {
        let Some(id) = conversation_state.conversation_key() else {
            warn!("conversation state without an id skipped");
            continue;
        };

        if model.lookup_conversation(id).is_some() {
            if let Some(snapshot) = &conversation_state.conversation {
                model.update_conversation(id, snapshot);
            }
            report.conversations_updated += 1;

            for event in &conversation_state.event {
                let target = event.conversation_key().unwrap_or(id);
                let already_seen = event.timestamp() <= watermark
                    || applied_live.contains(&event_key(target, event));
                if already_seen {
                    report.events_skipped += 1;
                    continue;
                }
                if apply_event(model, target, event) {
                    report.events_applied += 1;
                    newest_applied = newest_applied.max(event.timestamp());
                }
            }
            continue;
        }

        let Some(snapshot) = &conversation_state.conversation else {
            warn!(conversation_id = %id, "new conversation has no snapshot, skipped");
            continue;
        };
        model.create_conversation(&with_id(snapshot, id), &conversation_state.event);
        report.conversations_created += 1;
        report.events_applied += conversation_state.event.len();
        if let Some(newest) = conversation_state.event.iter().map(ClientEvent::timestamp).max() {
            newest_applied = newest_applied.max(newest);
        }
    }

    let sync_timestamp = response.sync_timestamp.unwrap_or(state.last_sync_timestamp);
    if newest_applied > sync_timestamp {
        warn!(
            sync_timestamp,
            newest_applied, "sync timestamp is older than an applied event; next resync may replay it"
        );
    }
    state.advance_watermark(sync_timestamp);
    report.sync_timestamp = state.last_sync_timestamp;
    report
}

/// Apply one live state update: header first, then its payload.
pub fn apply_state_update<M: ConversationModel>(
    state: &mut SyncState,
    model: &mut M,
    update: &StateUpdate,
) {
    if let Some(header) = &update.header {
        state.apply_header(header);
    }
    if let Some(snapshot) = &update.conversation {
        upsert_conversation(model, snapshot);
    }

    match &update.payload {
        StateUpdatePayload::Conversation(notification) => {
            if let Some(snapshot) = &notification.conversation {
                upsert_conversation(model, snapshot);
            }
        }
        StateUpdatePayload::Event(notification) => match &notification.event {
            Some(event) => match event.conversation_key() {
                Some(id) => {
                    if apply_event(model, id, event) {
                        state.record_live_event(id, event);
                    }
                }
                None => warn!("event without a conversation id ignored"),
            },
            None => debug!("empty event notification"),
        },
        StateUpdatePayload::Watermark(notification) => {
            let Some(id) = update.payload.conversation_key() else {
                return;
            };
            if model.lookup_conversation(id).is_none() {
                warn!(conversation_id = %id, "watermark for unknown conversation ignored");
                return;
            }
            if let Some(timestamp) = notification.latest_read_timestamp {
                model.update_read_state(id, timestamp);
            }
        }
        StateUpdatePayload::Focus(_) | StateUpdatePayload::Typing(_) => {
            if let Some(id) = update.payload.conversation_key() {
                if model.lookup_conversation(id).is_none() {
                    warn!(
                        conversation_id = %id,
                        kind = update.payload.kind(),
                        "notification for unknown conversation ignored"
                    );
                }
            }
        }
        StateUpdatePayload::Other { field, .. } => {
            debug!(field, "unhandled state update variant");
        }
        StateUpdatePayload::Empty => {}
    }
}

/// Append and handle an event for a known conversation. Returns false when
/// the conversation is unknown.
fn apply_event<M: ConversationModel>(model: &mut M, id: &str, event: &ClientEvent) -> bool {
    if model.lookup_conversation(id).is_none() {
        warn!(conversation_id = %id, "event for unknown conversation ignored");
        return false;
    }
    let handle = model.append_event(id, event);
    model.handle_event(id, &handle);
    true
}

fn upsert_conversation<M: ConversationModel>(model: &mut M, snapshot: &Conversation) {
    let Some(id) = snapshot.conversation_key() else {
        warn!("conversation snapshot without an id ignored");
        return;
    };
    if model.lookup_conversation(id).is_some() {
        model.update_conversation(id, snapshot);
    } else {
        model.create_conversation(snapshot, &[]);
    }
}

fn with_id(snapshot: &Conversation, id: &str) -> Conversation {
    let mut snapshot = snapshot.clone();
    if snapshot.conversation_id.is_none() {
        snapshot.conversation_id = Some(ConversationId::new(id));
    }
    snapshot
}
