//! Liveness check, distinct from the `system:health` broadcast the
//! health scheduler pushes to WebSocket clients (spec.md §4.8).

use axum::Json;
use serde_json::{Value, json};

/// GET /health — process liveness, not a subsystem health report.
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
