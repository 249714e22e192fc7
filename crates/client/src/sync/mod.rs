// Sync coordinator: watermark, channel session and active-client state for one client.
//
// All state changes go through one async mutex, so the live-update path and
// the resync path never advance the watermark concurrently. That lock is never
// held across a network call.

pub mod active;
pub mod apply;
pub mod state;

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use hangwire_common::pblite::DecodeErrorKind;
use hangwire_common::protocol::messages::{
    GetSelfInfoRequest, RequestHeader, SetActiveClientRequest, SyncAllNewEventsRequest,
};
use hangwire_common::protocol::{
    parse_frame, ChannelMessage, ChannelPayload, Envelope, GetSelfInfo, SetActiveClient,
    SyncAllNewEvents,
};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::ClientConfig;
use crate::events::{EventBus, ServiceEvent};
use crate::model::ConversationModel;
use crate::transport::{execute, service_registration_maps, Transport};

pub use active::SetActiveOutcome;
pub use apply::{apply_state_update, apply_sync_response, SyncReport};
pub use state::{ActivePhase, SyncState};

use active::Decision;

/// Result of a resync attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Never synced; live updates will bring the state.
    Skipped,
    Applied(SyncReport),
}

/// What happened to one inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    KeepAlive,
    /// The frame failed to decode and was dropped.
    Dropped(DecodeErrorKind),
    Processed {
        client_id_assigned: bool,
        state_updates: usize,
    },
}

struct Inner<M> {
    state: SyncState,
    model: M,
}

pub struct SyncCoordinator<T: Transport, M: ConversationModel> {
    inner: Mutex<Inner<M>>,
    /// One resync in flight at a time. Held across the request, unlike `inner`.
    resync_gate: Mutex<()>,
    transport: T,
    events: Arc<EventBus>,
    config: ClientConfig,
}

impl<T: Transport, M: ConversationModel> SyncCoordinator<T, M> {
    pub fn new(transport: T, model: M, events: Arc<EventBus>, config: ClientConfig) -> Self {
        Self {
            inner: Mutex::new(Inner { state: SyncState::new(), model }),
            resync_gate: Mutex::new(()),
            transport,
            events,
            config,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Copy of the current sync state.
    pub async fn state(&self) -> SyncState {
        self.inner.lock().await.state.clone()
    }

    pub async fn with_model<R>(&self, f: impl FnOnce(&M) -> R) -> R {
        let inner = self.inner.lock().await;
        f(&inner.model)
    }

    /// Seed the watermark from a previous run.
    pub async fn resume_from(&self, last_sync_timestamp: u64) {
        let mut inner = self.inner.lock().await;
        inner.state.advance_watermark(last_sync_timestamp);
    }

    // ── Channel lifecycle ──────────────────────────────────────────

    /// A new channel session started. Resyncs when a watermark exists.
    pub async fn on_connect(&self) -> Result<SyncOutcome> {
        let synced = {
            let mut inner = self.inner.lock().await;
            inner.state.begin_session();
            inner.state.is_synced()
        };
        info!(synced, "channel connected");
        self.events.emit(ServiceEvent::Connected).await;

        if synced {
            self.synchronize().await
        } else {
            Ok(SyncOutcome::Skipped)
        }
    }

    pub async fn on_disconnect(&self) {
        info!("channel disconnected");
        self.events.emit(ServiceEvent::Disconnected).await;
    }

    /// Request every event since the watermark and apply the response.
    ///
    /// Live frames keep flowing while the request is in flight; events they
    /// apply are not applied a second time from the response.
    pub async fn synchronize(&self) -> Result<SyncOutcome> {
        let _resync = self.resync_gate.lock().await;
        let (since, client_id) = {
            let mut inner = self.inner.lock().await;
            if !inner.state.is_synced() {
                debug!("never synced, nothing to resync");
                return Ok(SyncOutcome::Skipped);
            }
            (inner.state.begin_resync(), inner.state.client_id.clone())
        };

        let request = SyncAllNewEventsRequest {
            request_header: Some(RequestHeader::for_client(client_id.as_deref())),
            last_sync_timestamp: Some(since),
            max_response_size_bytes: Some(self.config.max_response_size_bytes),
        };
        let response = match execute::<SyncAllNewEvents, _>(&self.transport, &request).await {
            Ok(response) => response,
            Err(error) => {
                self.inner.lock().await.state.abort_resync();
                return Err(error.context("sync all new events failed"));
            }
        };

        let report = {
            let mut guard = self.inner.lock().await;
            let Inner { state, model } = &mut *guard;
            apply_sync_response(state, model, &response)
        };
        info!(
            updated = report.conversations_updated,
            created = report.conversations_created,
            events = report.events_applied,
            skipped = report.events_skipped,
            watermark = report.sync_timestamp,
            "sync applied"
        );
        self.events.emit(ServiceEvent::Synchronized { sync_timestamp: report.sync_timestamp }).await;
        Ok(SyncOutcome::Applied(report))
    }

    // ── Frames ─────────────────────────────────────────────────────

    /// Decode and apply one raw channel frame. Decode failures drop the frame.
    pub async fn handle_frame(&self, text: &str) -> FrameOutcome {
        match parse_frame(text) {
            Ok(Envelope::KeepAlive) => FrameOutcome::KeepAlive,
            Ok(Envelope::Message(message)) => self.handle_message(message).await,
            Err(error) => {
                warn!(path = %error.path(), %error, "dropping undecodable frame");
                FrameOutcome::Dropped(error.kind())
            }
        }
    }

    async fn handle_message(&self, message: ChannelMessage) -> FrameOutcome {
        let client_id_assigned = message.client_id.is_some();
        if let Some(client_id) = message.client_id {
            self.inner.lock().await.state.client_id = Some(client_id.clone());
            info!(%client_id, "channel session assigned client id");
            self.register_services().await;
        }

        let mut state_updates = 0;
        match message.payload {
            ChannelPayload::None => {}
            ChannelPayload::Ignored { discriminator } => {
                warn!(%discriminator, "ignoring channel payload");
            }
            ChannelPayload::BatchUpdate(batch) => {
                for update in batch.state_update {
                    {
                        let mut guard = self.inner.lock().await;
                        let Inner { state, model } = &mut *guard;
                        apply_state_update(state, model, &update);
                    }
                    self.events.emit(ServiceEvent::StateUpdated(Box::new(update))).await;
                    state_updates += 1;
                }
            }
        }

        FrameOutcome::Processed { client_id_assigned, state_updates }
    }

    async fn register_services(&self) {
        let maps = service_registration_maps(&self.config.channel_services);
        let count = maps.len();
        match self.transport.send_maps(maps).await {
            Ok(()) => debug!(count, "channel services registered"),
            Err(error) => warn!(?error, "failed to register channel services"),
        }
    }

    // ── Active client ──────────────────────────────────────────────

    pub async fn set_active(&self) -> Result<SetActiveOutcome> {
        self.set_active_at(Utc::now()).await
    }

    /// Ask the server to make this client active unless a recent request
    /// already did.
    pub async fn set_active_at(&self, now: DateTime<Utc>) -> Result<SetActiveOutcome> {
        let (client_id, email, attempt) = {
            let mut inner = self.inner.lock().await;
            match active::decide(&inner.state, now, self.config.set_active_limit()) {
                Decision::NoClientId => {
                    error!("cannot set active client until client_id is received");
                    return Ok(SetActiveOutcome::NoClientId);
                }
                Decision::Coalesced => {
                    debug!("set active coalesced with a recent request");
                    return Ok(SetActiveOutcome::Coalesced);
                }
                Decision::Proceed { client_id } => {
                    let attempt = active::begin(&mut inner.state, now);
                    (client_id, inner.state.email.clone(), attempt)
                }
            }
        };

        let result = self.request_active(&client_id, email).await;
        let mut inner = self.inner.lock().await;
        if !active::complete(&mut inner.state, attempt, result.is_ok()) {
            debug!(attempt, "set active result superseded by a newer attempt");
        }
        match result {
            Ok(()) => Ok(SetActiveOutcome::Requested),
            Err(error) => {
                warn!(?error, "set active client failed");
                Err(error)
            }
        }
    }

    async fn request_active(&self, client_id: &str, email: Option<String>) -> Result<()> {
        let email = match email {
            Some(email) => email,
            None => {
                let email = self.fetch_self_email(client_id).await?;
                self.inner.lock().await.state.email = Some(email.clone());
                email
            }
        };

        let full_jid = format!("{email}/{client_id}");
        let request = SetActiveClientRequest {
            request_header: Some(RequestHeader::for_client(Some(client_id))),
            is_active: Some(true),
            full_jid: Some(full_jid.clone()),
            timeout_secs: Some(self.config.active_timeout_secs),
        };
        execute::<SetActiveClient, _>(&self.transport, &request)
            .await
            .context("set active client request failed")?;
        info!(%full_jid, timeout_secs = self.config.active_timeout_secs, "client set active");
        Ok(())
    }

    async fn fetch_self_email(&self, client_id: &str) -> Result<String> {
        let request =
            GetSelfInfoRequest { request_header: Some(RequestHeader::for_client(Some(client_id))) };
        let response = execute::<GetSelfInfo, _>(&self.transport, &request)
            .await
            .context("get self info failed")?;
        response
            .primary_email()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("self info response has no email address"))
    }
}
