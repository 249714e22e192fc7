use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use hangwire_common::protocol::messages::{ActiveClientState, ClientEvent, StateUpdateHeader};

/// Identity of an applied event: conversation, timestamp and event id.
pub type EventKey = (String, u64, Option<String>);

pub fn event_key(conversation_id: &str, event: &ClientEvent) -> EventKey {
    (conversation_id.to_string(), event.timestamp(), event.event_id.clone())
}

/// Local view of active-client ownership.
///
/// `PendingActive` is set before the set-active request goes out and resolves
/// to `Active` or back to `NotActive` when it completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActivePhase {
    #[default]
    NotActive,
    PendingActive,
    Active,
}

impl ActivePhase {
    /// Pending counts as active so overlapping callers coalesce.
    pub fn counts_as_active(self) -> bool {
        matches!(self, Self::PendingActive | Self::Active)
    }
}

/// Watermark, session id and active-client bookkeeping for one client.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncState {
    /// Newest server time (microseconds) incorporated into the model. 0 = never synced.
    pub last_sync_timestamp: u64,
    /// Set once per channel session.
    pub client_id: Option<String>,
    pub active_phase: ActivePhase,
    /// Local wall-clock time of the last set-active attempt.
    pub last_active_at: Option<DateTime<Utc>>,
    /// Primary account address, fetched once.
    pub email: Option<String>,
    /// Bumped by every set-active attempt; only the latest one may complete.
    pub active_attempt: u64,
    /// Watermark a resync in flight was requested from.
    pub resync_since: Option<u64>,
    /// Events applied live while that resync was in flight.
    pub live_during_resync: BTreeSet<EventKey>,
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_synced(&self) -> bool {
        self.last_sync_timestamp > 0
    }

    /// Raise the watermark to `timestamp`; lower values are ignored.
    ///
    /// Returns true when the watermark moved.
    pub fn advance_watermark(&mut self, timestamp: u64) -> bool {
        if timestamp > self.last_sync_timestamp {
            self.last_sync_timestamp = timestamp;
            return true;
        }
        false
    }

    /// Record the current watermark as the baseline of a resync about to be
    /// requested, and start collecting live events applied meanwhile.
    pub fn begin_resync(&mut self) -> u64 {
        self.resync_since = Some(self.last_sync_timestamp);
        self.live_during_resync.clear();
        self.last_sync_timestamp
    }

    pub fn abort_resync(&mut self) {
        self.resync_since = None;
        self.live_during_resync.clear();
    }

    /// Baseline and live-applied set for the response being applied. Without a
    /// resync in flight the baseline is the current watermark.
    pub fn finish_resync(&mut self) -> (u64, BTreeSet<EventKey>) {
        let since = self.resync_since.take().unwrap_or(self.last_sync_timestamp);
        (since, std::mem::take(&mut self.live_during_resync))
    }

    pub fn record_live_event(&mut self, conversation_id: &str, event: &ClientEvent) {
        if self.resync_since.is_some() {
            self.live_during_resync.insert(event_key(conversation_id, event));
        }
    }

    /// A new channel session invalidates the previous client id.
    pub fn begin_session(&mut self) {
        self.client_id = None;
    }

    /// Apply the active-client state and server time from a live update header.
    ///
    /// While a set-active request is in flight the phase is left alone; the
    /// request's completion decides it.
    pub fn apply_header(&mut self, header: &StateUpdateHeader) {
        if let Some(state) = header.active_client_state {
            if self.active_phase != ActivePhase::PendingActive {
                self.active_phase = match state {
                    ActiveClientState::IsActive => ActivePhase::Active,
                    _ => ActivePhase::NotActive,
                };
            }
        }
        if let Some(time) = header.current_server_time {
            self.advance_watermark(time);
        }
    }

    /// `<email>/<client_id>`, once both are known.
    pub fn full_jid(&self) -> Option<String> {
        match (&self.email, &self.client_id) {
            (Some(email), Some(client_id)) => Some(format!("{email}/{client_id}")),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(state: Option<ActiveClientState>, time: Option<u64>) -> StateUpdateHeader {
        StateUpdateHeader { active_client_state: state, request_trace_id: None, current_server_time: time }
    }

    #[test]
    fn watermark_never_decreases() {
        let mut state = SyncState::new();
        assert!(!state.is_synced());
        assert!(state.advance_watermark(100));
        assert!(!state.advance_watermark(50));
        assert!(!state.advance_watermark(100));
        assert_eq!(state.last_sync_timestamp, 100);
        assert!(state.is_synced());
    }

    #[test]
    fn header_sets_phase_and_watermark() {
        let mut state = SyncState::new();
        state.apply_header(&header(Some(ActiveClientState::IsActive), Some(10)));
        assert_eq!(state.active_phase, ActivePhase::Active);
        assert_eq!(state.last_sync_timestamp, 10);

        state.apply_header(&header(Some(ActiveClientState::OtherActive), Some(5)));
        assert_eq!(state.active_phase, ActivePhase::NotActive);
        assert_eq!(state.last_sync_timestamp, 10);
    }

    #[test]
    fn pending_phase_survives_headers() {
        let mut state = SyncState { active_phase: ActivePhase::PendingActive, ..SyncState::new() };
        state.apply_header(&header(Some(ActiveClientState::NoActive), None));
        assert_eq!(state.active_phase, ActivePhase::PendingActive);
    }

    #[test]
    fn resync_keeps_its_baseline_while_watermark_moves() {
        let mut state = SyncState { last_sync_timestamp: 1000, ..SyncState::new() };
        assert_eq!(state.begin_resync(), 1000);

        let event = ClientEvent { timestamp: Some(2000), ..Default::default() };
        state.record_live_event("c1", &event);
        state.advance_watermark(2000);

        let (since, live) = state.finish_resync();
        assert_eq!(since, 1000);
        assert!(live.contains(&event_key("c1", &event)));
        assert_eq!(state.resync_since, None);
        assert!(state.live_during_resync.is_empty());
    }

    #[test]
    fn live_events_are_not_tracked_without_resync() {
        let mut state = SyncState::new();
        state.record_live_event("c1", &ClientEvent::default());
        assert!(state.live_during_resync.is_empty());
        assert_eq!(state.finish_resync().0, 0);
    }

    #[test]
    fn new_session_clears_client_id_only() {
        let mut state = SyncState {
            last_sync_timestamp: 7,
            client_id: Some("abc".into()),
            email: Some("a@b.c".into()),
            ..SyncState::new()
        };
        assert_eq!(state.full_jid().as_deref(), Some("a@b.c/abc"));
        state.begin_session();
        assert_eq!(state.client_id, None);
        assert_eq!(state.last_sync_timestamp, 7);
        assert_eq!(state.full_jid(), None);
    }
}
