//! Connection hub: one task per channel owning the set of live clients.
//!
//! Every mutation of the client set goes through [`HubEvent`]s processed in
//! order by the hub task. Each client has a bounded outbound queue whose only
//! sender lives here, so removing a client closes its queue.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};

use crate::channel::ChannelHandler;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(pub u64);

/// Identity of one connection. Several connections may share a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub id: ClientId,
    pub user_token: String,
}

/// A message queued for delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    /// Token of the connection that caused the message, if any
    pub origin_token: Option<Arc<str>>,
    pub payload: Arc<str>,
}

impl Outbound {
    pub fn text(payload: impl Into<Arc<str>>) -> Self {
        Self {
            origin_token: None,
            payload: payload.into(),
        }
    }

    pub fn from_origin(origin_token: &str, payload: impl Into<Arc<str>>) -> Self {
        Self {
            origin_token: Some(Arc::from(origin_token)),
            payload: payload.into(),
        }
    }
}

pub enum HubEvent {
    Register {
        client: ClientInfo,
        queue: mpsc::Sender<Outbound>,
    },
    Unregister(ClientId),
    Broadcast(Outbound),
    SendTo {
        id: ClientId,
        message: Outbound,
    },
    CloseAll,
    ClientCount(oneshot::Sender<usize>),
}

/// Cheap, cloneable access to a running hub.
#[derive(Clone)]
pub struct HubHandle {
    tx: mpsc::UnboundedSender<HubEvent>,
    handler: Arc<dyn ChannelHandler>,
    next_id: Arc<AtomicU64>,
}

impl HubHandle {
    pub fn handler(&self) -> &Arc<dyn ChannelHandler> {
        &self.handler
    }

    pub fn next_client_id(&self) -> ClientId {
        ClientId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn send(&self, event: HubEvent) {
        if self.tx.send(event).is_err() {
            tracing::warn!(hub = self.handler.name(), "hub task is gone, event dropped");
        }
    }

    pub fn register(&self, client: ClientInfo, queue: mpsc::Sender<Outbound>) {
        self.send(HubEvent::Register { client, queue });
    }

    pub fn unregister(&self, id: ClientId) {
        self.send(HubEvent::Unregister(id));
    }

    pub fn broadcast(&self, message: Outbound) {
        self.send(HubEvent::Broadcast(message));
    }

    pub fn send_to(&self, id: ClientId, message: Outbound) {
        self.send(HubEvent::SendTo { id, message });
    }

    pub fn close_all(&self) {
        self.send(HubEvent::CloseAll);
    }

    /// Number of registered clients once every earlier event is processed.
    pub async fn client_count(&self) -> usize {
        let (tx, rx) = oneshot::channel();
        self.send(HubEvent::ClientCount(tx));
        rx.await.unwrap_or(0)
    }
}

struct Entry {
    info: ClientInfo,
    queue: mpsc::Sender<Outbound>,
}

/// Start a hub task for `handler` and return its handle.
pub fn spawn_hub(handler: Arc<dyn ChannelHandler>, departure_hook_delay: Duration) -> HubHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let next_id = Arc::new(AtomicU64::new(1));
    let hub = Hub {
        clients: HashMap::new(),
        events: tx.downgrade(),
        handler: handler.clone(),
        next_id: next_id.clone(),
        departure_hook_delay,
    };
    tokio::spawn(hub.run(rx));
    HubHandle {
        tx,
        handler,
        next_id,
    }
}

struct Hub {
    clients: HashMap<ClientId, Entry>,
    /// Weak so the hub stops once every handle is dropped
    events: mpsc::WeakUnboundedSender<HubEvent>,
    handler: Arc<dyn ChannelHandler>,
    next_id: Arc<AtomicU64>,
    departure_hook_delay: Duration,
}

impl Hub {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<HubEvent>) {
        let name = self.handler.name();
        tracing::debug!(hub = name, "hub started");
        while let Some(event) = rx.recv().await {
            match event {
                HubEvent::Register { client, queue } => {
                    tracing::debug!(hub = name, id = client.id.0, "client registered");
                    self.clients.insert(client.id, Entry { info: client, queue });
                }
                HubEvent::Unregister(id) => self.unregister(id),
                HubEvent::Broadcast(message) => {
                    let ids: Vec<ClientId> = self.clients.keys().copied().collect();
                    for id in ids {
                        self.deliver(id, message.clone());
                    }
                }
                HubEvent::SendTo { id, message } => self.deliver(id, message),
                HubEvent::CloseAll => {
                    let ids: Vec<ClientId> = self.clients.keys().copied().collect();
                    for id in ids {
                        self.unregister(id);
                    }
                }
                HubEvent::ClientCount(reply) => {
                    let _ = reply.send(self.clients.len());
                }
            }
        }
        tracing::debug!(hub = name, "hub stopped");
    }

    /// Remove the client (closing its queue) and schedule the departure hook.
    fn unregister(&mut self, id: ClientId) {
        let Some(entry) = self.clients.remove(&id) else {
            return;
        };
        drop(entry.queue);
        tracing::debug!(hub = self.handler.name(), id = id.0, "client unregistered");

        let Some(tx) = self.events.upgrade() else {
            return;
        };
        let handle = HubHandle {
            tx,
            handler: self.handler.clone(),
            next_id: self.next_id.clone(),
        };
        let delay = self.departure_hook_delay;
        let departed = entry.info;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            handle.handler.on_unregister(&departed, &handle);
        });
    }

    /// Non-blocking enqueue. A client that cannot keep up is dropped.
    fn deliver(&mut self, id: ClientId, message: Outbound) {
        let Some(entry) = self.clients.get(&id) else {
            return;
        };
        match entry.queue.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!(hub = self.handler.name(), id = id.0, "send queue full, dropping client");
                self.clients.remove(&id);
            }
            Err(TrySendError::Closed(_)) => {
                self.clients.remove(&id);
            }
        }
    }
}
