// Ordered channel loop: feeds connect/disconnect signals and frames to the coordinator.

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::model::ConversationModel;
use crate::sync::{FrameOutcome, SyncCoordinator};
use crate::transport::Transport;

/// What the channel transport reports, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Connected,
    Disconnected,
    Frame(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub connects: usize,
    pub disconnects: usize,
    pub frames: usize,
    pub keep_alives: usize,
    pub dropped_frames: usize,
    pub state_updates: usize,
    pub sync_failures: usize,
}

/// Process channel events one at a time until the queue closes or shutdown fires.
///
/// Frames are never processed concurrently; event application depends on the
/// watermark left by the previous frame.
pub async fn run_channel<T, M>(
    coordinator: &SyncCoordinator<T, M>,
    mut events: mpsc::Receiver<ChannelEvent>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> RunSummary
where
    T: Transport,
    M: ConversationModel,
{
    let mut summary = RunSummary::default();
    loop {
        let event = tokio::select! {
            biased;
            _ = shutdown_rx.recv() => {
                info!("channel runtime shutting down");
                break;
            }
            event = events.recv() => match event {
                Some(event) => event,
                None => {
                    debug!("channel event queue closed");
                    break;
                }
            },
        };

        match event {
            ChannelEvent::Connected => {
                summary.connects += 1;
                if let Err(error) = coordinator.on_connect().await {
                    summary.sync_failures += 1;
                    warn!(?error, "resync after connect failed");
                }
            }
            ChannelEvent::Disconnected => {
                summary.disconnects += 1;
                coordinator.on_disconnect().await;
            }
            ChannelEvent::Frame(text) => {
                summary.frames += 1;
                match coordinator.handle_frame(&text).await {
                    FrameOutcome::KeepAlive => summary.keep_alives += 1,
                    FrameOutcome::Dropped(_) => summary.dropped_frames += 1,
                    FrameOutcome::Processed { state_updates, .. } => {
                        summary.state_updates += state_updates;
                    }
                }
            }
        }
    }
    summary
}
