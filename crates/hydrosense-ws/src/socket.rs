//! Per-connection message vocabulary and the connection actor loop
//! (spec.md §4.7 "Rooms", §6 "WebSocket events").

use std::time::Instant;

use axum::extract::ws::{Message, WebSocket};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use hydrosense_protocol::ws_event::WsEvent;

use crate::config::WsConfig;
use crate::hub::Hub;
use crate::rooms::{device_room, ALERTS_ALL};

/// Inbound client→server messages (spec.md §6 "Client→server").
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ClientMessage {
    #[serde(rename = "subscribe:devices")]
    SubscribeDevices { ids: Vec<String> },
    #[serde(rename = "unsubscribe:devices")]
    UnsubscribeDevices { ids: Vec<String> },
    #[serde(rename = "subscribe:alerts")]
    SubscribeAlerts {},
    #[serde(rename = "unsubscribe:alerts")]
    UnsubscribeAlerts {},
}

/// Drive one authenticated connection until it closes. Forwards hub
/// dispatches to the client and applies subscribe/unsubscribe requests
/// from the client to its room membership.
pub async fn run_connection(
    mut socket: WebSocket,
    hub: &Hub,
    config: &WsConfig,
    socket_id: Uuid,
    initial_rooms: Vec<String>,
) {
    let _ = socket
        .send(Message::Text(
            serde_json::to_string(&WsEvent::ConnectionStatus {
                status: "connected".into(),
                timestamp: Utc::now(),
            })
            .unwrap()
            .into(),
        ))
        .await;

    let mut rx = hub.register(socket_id, initial_rooms).await;
    let mut ping_interval = tokio::time::interval(config.ping_interval());
    let mut last_activity = Instant::now();
    let timeout = config.ping_timeout();

    loop {
        tokio::select! {
            outgoing = rx.recv() => {
                match outgoing {
                    Some(json) => {
                        if socket.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break, // hub dropped us (slow consumer or shutdown)
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        last_activity = Instant::now();
                        handle_client_message(&text, hub, socket_id, &mut socket).await;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        last_activity = Instant::now();
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        last_activity = Instant::now();
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Binary(_))) => {}
                    Some(Err(_)) => break,
                }
            }
            _ = ping_interval.tick() => {
                if last_activity.elapsed() > timeout {
                    tracing::info!(%socket_id, "ws ping timeout, closing");
                    break;
                }
                if socket.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
        }
    }

    hub.unregister(&socket_id).await;
}

async fn handle_client_message(text: &str, hub: &Hub, socket_id: Uuid, socket: &mut WebSocket) {
    let parsed: Result<ClientMessage, _> = serde_json::from_str(text);
    match parsed {
        Ok(ClientMessage::SubscribeDevices { ids }) => {
            hub.subscribe(&socket_id, ids.iter().map(|id| device_room(id))).await;
        }
        Ok(ClientMessage::UnsubscribeDevices { ids }) => {
            hub.unsubscribe(&socket_id, ids.iter().map(|id| device_room(id))).await;
        }
        Ok(ClientMessage::SubscribeAlerts {}) => {
            hub.subscribe(&socket_id, [ALERTS_ALL.to_string()]).await;
        }
        Ok(ClientMessage::UnsubscribeAlerts {}) => {
            hub.unsubscribe(&socket_id, [ALERTS_ALL.to_string()]).await;
        }
        Err(_) => {
            let error = WsEvent::Error {
                message: "could not parse subscribe/unsubscribe request".into(),
                code: "INVALID_SUBSCRIBE".into(),
                timestamp: Utc::now(),
            };
            if let Ok(json) = serde_json::to_string(&error) {
                let _ = socket.send(Message::Text(json.into())).await;
            }
        }
    }
}
