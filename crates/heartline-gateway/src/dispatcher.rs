use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tracing::debug;
use uuid::Uuid;

use heartline_types::events::GatewayEvent;

/// Where a handler wants an event to go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// The connection that issued the command.
    Caller,
    /// Whatever connection the user currently has, if any.
    User(Uuid),
}

/// An event produced by a command handler, dispatched after the handler
/// returns.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub to: Recipient,
    pub event: GatewayEvent,
}

impl Outbound {
    pub fn caller(event: GatewayEvent) -> Self {
        Self {
            to: Recipient::Caller,
            event,
        }
    }

    pub fn user(user_id: Uuid, event: GatewayEvent) -> Self {
        Self {
            to: Recipient::User(user_id),
            event,
        }
    }
}

/// The outbound queue of one live connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub conn_id: Uuid,
    tx: mpsc::UnboundedSender<GatewayEvent>,
}

impl ConnectionHandle {
    /// Queue an event for this connection. False if it has already closed.
    pub fn send(&self, event: GatewayEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

/// Tracks which connection each online user is reachable on.
#[derive(Clone, Default)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

#[derive(Default)]
struct DispatcherInner {
    /// user_id -> current connection. Last registration wins.
    connections: RwLock<HashMap<Uuid, ConnectionHandle>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection for `user_id`, replacing any previous one.
    /// Returns the handle and the receiving end of its queue.
    pub async fn register(&self, user_id: Uuid) -> (ConnectionHandle, mpsc::UnboundedReceiver<GatewayEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = ConnectionHandle {
            conn_id: Uuid::new_v4(),
            tx,
        };
        let replaced = self
            .inner
            .connections
            .write()
            .await
            .insert(user_id, handle.clone());
        if let Some(old) = replaced {
            debug!("{} reconnected, replacing connection {}", user_id, old.conn_id);
        }
        (handle, rx)
    }

    pub async fn lookup(&self, user_id: Uuid) -> Option<ConnectionHandle> {
        self.inner.connections.read().await.get(&user_id).cloned()
    }

    pub async fn is_online(&self, user_id: Uuid) -> bool {
        self.inner.connections.read().await.contains_key(&user_id)
    }

    /// Remove the user's entry, but only if `conn_id` is still the one
    /// registered. A newer connection is left alone.
    pub async fn unregister(&self, user_id: Uuid, conn_id: Uuid) -> bool {
        let mut connections = self.inner.connections.write().await;
        match connections.get(&user_id) {
            Some(current) if current.conn_id == conn_id => {
                connections.remove(&user_id);
                true
            }
            _ => false,
        }
    }

    /// Send a targeted event to a specific user. False when the user is
    /// offline or their connection is shutting down.
    pub async fn send_to_user(&self, user_id: Uuid, event: GatewayEvent) -> bool {
        let connections = self.inner.connections.read().await;
        match connections.get(&user_id) {
            Some(handle) => handle.send(event),
            None => false,
        }
    }

    pub async fn online_count(&self) -> usize {
        self.inner.connections.read().await.len()
    }

    /// Push handler output, in order, to the calling connection or the
    /// target users.
    pub async fn dispatch(&self, caller: &ConnectionHandle, outbound: Vec<Outbound>) {
        for Outbound { to, event } in outbound {
            let name = event.name();
            let sent = match to {
                Recipient::Caller => caller.send(event),
                Recipient::User(user_id) => self.send_to_user(user_id, event).await,
            };
            if !sent {
                debug!("{} for {:?} not delivered (offline)", name, to);
            }
        }
    }
}
