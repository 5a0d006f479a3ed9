//! WebSocket Hub (spec.md §4.7 "WebSocket Hub (C7)"): authenticated
//! client connections, room-based subscriptions, and non-blocking
//! room fan-out for sensor, status, alert, health, and analytics events.

pub mod config;
pub mod hub;
pub mod rooms;
pub mod route;
pub mod socket;

pub use config::WsConfig;
pub use hub::Hub;
pub use route::{ws_handler, WsQuery, WsState};
