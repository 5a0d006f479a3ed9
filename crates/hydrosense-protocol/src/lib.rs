//! Shared wire and domain types for the HydroSense real-time core.
//!
//! Device telemetry arrives over MQTT as loosely-typed JSON; this crate
//! gives every hop (MQTT gateway, store, alert engine, WebSocket hub) a
//! single typed vocabulary so no component re-derives validation or
//! serialization rules.

pub mod alert;
pub mod commands;
pub mod device;
pub mod sensor;
pub mod topics;
pub mod user;
pub mod ws_event;

pub use alert::*;
pub use commands::*;
pub use device::*;
pub use sensor::*;
pub use user::*;
pub use ws_event::WsEvent;
