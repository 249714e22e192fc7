// Observer registry owned by the client and shared with the coordinator.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use hangwire_common::protocol::messages::StateUpdate;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;

/// Signals emitted to observers outside the sync core.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceEvent {
    Connected,
    Disconnected,
    /// A resync finished; carries the new watermark.
    Synchronized { sync_timestamp: u64 },
    /// Raw live update, after the coordinator applied it.
    StateUpdated(Box<StateUpdate>),
}

pub type SubscriptionId = u64;

pub type EventHandler = Arc<dyn Fn(&ServiceEvent) + Send + Sync>;

struct Subscription {
    id: SubscriptionId,
    handler: EventHandler,
}

/// Explicit subscribe/unsubscribe bus, torn down with its owner.
#[derive(Default)]
pub struct EventBus {
    handlers: RwLock<Vec<Subscription>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; returns `None` once the bus has shut down.
    pub async fn subscribe(&self, handler: EventHandler) -> Option<SubscriptionId> {
        if self.is_closed() {
            return None;
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers.write().await.push(Subscription { id, handler });
        Some(id)
    }

    /// Deliver events into an unbounded channel instead of a callback.
    pub async fn subscribe_channel(
        &self,
    ) -> Option<(SubscriptionId, mpsc::UnboundedReceiver<ServiceEvent>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let handler: EventHandler = Arc::new(move |event: &ServiceEvent| {
            let _ = tx.send(event.clone());
        });
        self.subscribe(handler).await.map(|id| (id, rx))
    }

    pub async fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write().await;
        let initial_len = handlers.len();
        handlers.retain(|subscription| subscription.id != id);
        handlers.len() < initial_len
    }

    pub async fn emit(&self, event: ServiceEvent) {
        if self.is_closed() {
            return;
        }
        let handlers = self.handlers.read().await;
        for subscription in handlers.iter() {
            (subscription.handler)(&event);
        }
    }

    pub async fn subscriber_count(&self) -> usize {
        self.handlers.read().await.len()
    }

    /// Drop every handler and refuse new ones. Channel receivers see the
    /// sender side close.
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let removed = {
            let mut handlers = self.handlers.write().await;
            std::mem::take(&mut *handlers).len()
        };
        debug!(removed, "event bus shut down");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
