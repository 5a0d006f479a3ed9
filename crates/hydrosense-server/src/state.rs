//! Shared application state for the Axum server.
//!
//! Owned, explicit subsystems wired once at startup (spec.md §9
//! "Singletons → owned subsystems") — no global mutable state.

use std::sync::Arc;

use axum::extract::FromRef;
use tokio::sync::broadcast;

use hydrosense_mqtt::Channel;
use hydrosense_protocol::ws_event::WsEvent;
use hydrosense_store::Store;
use hydrosense_ws::{Hub, WsState};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub channel: Arc<dyn Channel>,
    pub events: broadcast::Sender<WsEvent>,
    pub hub: Arc<Hub>,
}

/// Lets `hydrosense_ws::ws_handler` extract its narrower `WsState` out
/// of the server's full `AppState` (spec.md §4.7 wiring point).
impl FromRef<AppState> for WsState {
    fn from_ref(state: &AppState) -> Self {
        WsState {
            store: state.store.clone(),
            hub: state.hub.clone(),
        }
    }
}
