//! Router assembly for the server's narrow external surface: liveness
//! and the WebSocket upgrade (spec.md §1 "OUT OF SCOPE" excludes REST
//! CRUD on devices/users/reports — those are external collaborators).

pub mod health;

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/ws", get(hydrosense_ws::ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tokio::sync::broadcast;
    use tower::ServiceExt;

    use hydrosense_mqtt::MockChannel;
    use hydrosense_store::MemoryStore;
    use hydrosense_ws::{Hub, WsConfig};

    fn app() -> Router {
        let (events, _rx) = broadcast::channel(16);
        let state = AppState {
            store: Arc::new(MemoryStore::new()),
            channel: Arc::new(MockChannel::new()),
            events,
            hub: Hub::new(WsConfig::default()),
        };
        build_router(state)
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }
}
