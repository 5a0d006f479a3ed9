//! Connection registry and room-based fan-out (spec.md §4.7, §5).
//!
//! Holds no device or alert state of its own — only socket-id → room
//! membership, exactly as spec.md §3 "Ownership" describes. Dispatch is
//! non-blocking per subscriber: a socket whose outbound queue is full is
//! disconnected with `SLOW_CONSUMER` rather than stalling the fan-out
//! (spec.md §5).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, RwLock};
use uuid::Uuid;

use hydrosense_protocol::ws_event::WsEvent;

use crate::config::WsConfig;
use crate::rooms::target_rooms;

struct SocketEntry {
    tx: mpsc::Sender<String>,
    rooms: HashSet<String>,
}

/// The WebSocket Hub (spec.md §4.7 "WebSocket Hub (C7)").
pub struct Hub {
    sockets: RwLock<HashMap<Uuid, SocketEntry>>,
    config: WsConfig,
}

impl Hub {
    pub fn new(config: WsConfig) -> Arc<Self> {
        Arc::new(Self {
            sockets: RwLock::new(HashMap::new()),
            config,
        })
    }

    /// Register a freshly-authenticated socket with its initial role
    /// rooms. Returns the receiving half the socket task forwards to
    /// the client.
    pub async fn register(&self, socket_id: Uuid, initial_rooms: Vec<String>) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(self.config.send_buffer_high_water);
        self.sockets.write().await.insert(
            socket_id,
            SocketEntry {
                tx,
                rooms: initial_rooms.into_iter().collect(),
            },
        );
        rx
    }

    pub async fn unregister(&self, socket_id: &Uuid) {
        self.sockets.write().await.remove(socket_id);
    }

    pub async fn subscribe(&self, socket_id: &Uuid, rooms: impl IntoIterator<Item = String>) {
        if let Some(entry) = self.sockets.write().await.get_mut(socket_id) {
            entry.rooms.extend(rooms);
        }
    }

    pub async fn unsubscribe(&self, socket_id: &Uuid, rooms: impl IntoIterator<Item = String>) {
        if let Some(entry) = self.sockets.write().await.get_mut(socket_id) {
            for room in rooms {
                entry.rooms.remove(&room);
            }
        }
    }

    /// Fan an event out to every socket subscribed to one of its target
    /// rooms. Sockets whose queue is full are dropped from the registry
    /// (slow-consumer disconnect); their socket task observes the closed
    /// sender and exits.
    pub async fn dispatch(&self, event: &WsEvent) {
        let rooms = target_rooms(event);
        let json = match serde_json::to_string(event) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize ws event, dropping");
                return;
            }
        };

        let mut slow_consumers = Vec::new();
        {
            let sockets = self.sockets.read().await;
            for (id, entry) in sockets.iter() {
                if !rooms.iter().any(|r| entry.rooms.contains(r)) {
                    continue;
                }
                if entry.tx.try_send(json.clone()).is_err() {
                    slow_consumers.push(*id);
                }
            }
        }

        if !slow_consumers.is_empty() {
            let mut sockets = self.sockets.write().await;
            for id in slow_consumers {
                tracing::warn!(socket_id = %id, "disconnecting slow consumer");
                sockets.remove(&id);
            }
        }
    }

    /// Send a single frame directly to one socket (used for the
    /// post-auth-failure `error{AUTH_ERROR}` and ack frames that don't
    /// go through room dispatch).
    pub async fn send_direct(&self, socket_id: &Uuid, event: &WsEvent) {
        let json = match serde_json::to_string(event) {
            Ok(j) => j,
            Err(_) => return,
        };
        if let Some(entry) = self.sockets.read().await.get(socket_id) {
            let _ = entry.tx.try_send(json);
        }
    }

    pub fn config(&self) -> &WsConfig {
        &self.config
    }

    pub async fn room_count(&self, room: &str) -> usize {
        self.sockets.read().await.values().filter(|e| e.rooms.contains(room)).count()
    }

    /// Drive the hub from the shared event bus until it closes. Spawned
    /// once at startup.
    pub async fn run(self: Arc<Self>, mut events: broadcast::Receiver<WsEvent>) {
        loop {
            match events.recv().await {
                Ok(event) => self.dispatch(&event).await,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "ws hub lagged behind event bus");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("ws hub event bus closed, stopping");
                    return;
                }
            }
        }
    }
}
