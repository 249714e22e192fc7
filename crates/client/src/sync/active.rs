// Set-active negotiation: when to ask the server to make this client active.

use chrono::{DateTime, TimeDelta, Utc};

use super::state::{ActivePhase, SyncState};

/// What a set-active call ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetActiveOutcome {
    /// No channel session yet; nothing can be addressed.
    NoClientId,
    /// Already active (or pending) within the cooldown.
    Coalesced,
    /// A request was sent and acknowledged.
    Requested,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Decision {
    NoClientId,
    Coalesced,
    Proceed { client_id: String },
}

pub(crate) fn decide(state: &SyncState, now: DateTime<Utc>, limit: TimeDelta) -> Decision {
    let Some(client_id) = state.client_id.clone() else {
        return Decision::NoClientId;
    };
    let is_active = state.active_phase.counts_as_active();
    let timed_out = state.last_active_at.is_none_or(|at| now - at > limit);
    if !is_active || timed_out {
        Decision::Proceed { client_id }
    } else {
        Decision::Coalesced
    }
}

/// Optimistic transition taken before the request goes out. Returns the
/// attempt tag to hand back to [`complete`].
pub(crate) fn begin(state: &mut SyncState, now: DateTime<Utc>) -> u64 {
    state.active_attempt += 1;
    state.active_phase = ActivePhase::PendingActive;
    state.last_active_at = Some(now);
    state.active_attempt
}

/// Settle an attempt. A completion superseded by a later `begin` leaves the
/// state alone and returns false.
pub(crate) fn complete(state: &mut SyncState, attempt: u64, succeeded: bool) -> bool {
    if attempt != state.active_attempt {
        return false;
    }
    if succeeded {
        state.active_phase = ActivePhase::Active;
    } else {
        state.active_phase = ActivePhase::NotActive;
        state.last_active_at = None;
    }
    true
}
