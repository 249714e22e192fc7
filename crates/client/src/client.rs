// Top-level client: owns the event bus, the coordinator and the shutdown signal.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::config::ClientConfig;
use crate::events::EventBus;
use crate::model::ConversationModel;
use crate::runtime::{run_channel, ChannelEvent, RunSummary};
use crate::sync::SyncCoordinator;
use crate::transport::Transport;

pub struct Client<T: Transport, M: ConversationModel> {
    coordinator: Arc<SyncCoordinator<T, M>>,
    events: Arc<EventBus>,
    shutdown_tx: broadcast::Sender<()>,
    queue_capacity: usize,
}

impl<T, M> Client<T, M>
where
    T: Transport + 'static,
    M: ConversationModel + 'static,
{
    pub fn new(transport: T, model: M, config: ClientConfig) -> Self {
        let events = Arc::new(EventBus::new());
        let queue_capacity = config.event_channel_capacity.max(1);
        let coordinator =
            Arc::new(SyncCoordinator::new(transport, model, Arc::clone(&events), config));
        let (shutdown_tx, _) = broadcast::channel(4);
        Self { coordinator, events, shutdown_tx, queue_capacity }
    }

    pub fn coordinator(&self) -> &Arc<SyncCoordinator<T, M>> {
        &self.coordinator
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Start the ordered channel loop on the runtime.
    pub fn spawn_channel(&self) -> ChannelHandle {
        let (sender, receiver) = mpsc::channel(self.queue_capacity);
        let shutdown_rx = self.shutdown_tx.subscribe();
        let coordinator = Arc::clone(&self.coordinator);
        let task =
            tokio::spawn(async move { run_channel(&coordinator, receiver, shutdown_rx).await });
        ChannelHandle { sender, task }
    }

    /// Stop channel loops and tear down every subscription.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
        self.events.shutdown().await;
    }
}

impl<T: Transport, M: ConversationModel> Drop for Client<T, M> {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
    }
}

/// Inbound side of a running channel loop.
pub struct ChannelHandle {
    sender: mpsc::Sender<ChannelEvent>,
    task: JoinHandle<RunSummary>,
}

impl ChannelHandle {
    pub fn sender(&self) -> mpsc::Sender<ChannelEvent> {
        self.sender.clone()
    }

    pub async fn send(&self, event: ChannelEvent) -> Result<()> {
        self.sender.send(event).await.map_err(|_| anyhow!("channel loop is no longer running"))
    }

    /// Close the queue and wait for the loop to drain it.
    pub async fn finish(self) -> Result<RunSummary> {
        drop(self.sender);
        self.task.await.context("channel loop task failed")
    }
}
