//! HydroSense ingestion and dispatch core: wires the MQTT Gateway,
//! Presence Tracker, Sensor Ingestor, Alert Engine, Notification
//! Queue, WebSocket Hub, Broadcast Schedulers, and Command Dispatcher
//! into a running server (spec.md §2).

pub mod config;
pub mod dispatcher;
pub mod gateway;
pub mod ingestor;
pub mod routes;
pub mod schedulers;
pub mod state;

pub use config::ServerConfig;
pub use state::AppState;
