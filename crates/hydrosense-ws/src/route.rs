//! Axum upgrade endpoint: authenticates the handshake, resolves role
//! from the Store, and joins the socket to its role rooms (spec.md
//! §4.7 "Connection lifecycle").

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use hydrosense_protocol::ws_event::WsEvent;
use hydrosense_store::Store;

use crate::hub::Hub;
use crate::rooms::role_rooms;
use crate::socket::run_connection;

#[derive(Clone)]
pub struct WsState {
    pub store: Arc<dyn Store>,
    pub hub: Arc<Hub>,
}

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

fn extract_token(headers: &HeaderMap, query: &WsQuery) -> Option<String> {
    if let Some(value) = headers.get(axum::http::header::AUTHORIZATION) {
        if let Ok(text) = value.to_str() {
            if let Some(token) = text.strip_prefix("Bearer ") {
                return Some(token.to_string());
            }
        }
    }
    query.token.clone()
}

/// GET /ws — upgrade to WebSocket for real-time device/alert/health events.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<WsState>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let token = extract_token(&headers, &query);

    ws.on_upgrade(move |mut socket| async move {
        let user = match token {
            Some(t) => state.store.get_user_by_token(&t).await.ok().flatten(),
            None => None,
        };

        let Some(user) = user else {
            let error = WsEvent::Error {
                message: "missing or invalid bearer token".into(),
                code: "AUTH_ERROR".into(),
                timestamp: Utc::now(),
            };
            if let Ok(json) = serde_json::to_string(&error) {
                let _ = socket.send(Message::Text(json.into())).await;
            }
            let _ = socket.send(Message::Close(None)).await;
            return;
        };

        let socket_id = Uuid::new_v4();
        let initial_rooms = role_rooms(user.role);
        let config = state.hub.config().clone();
        run_connection(socket, &state.hub, &config, socket_id, initial_rooms).await;
    })
}
